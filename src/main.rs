use joule_queue::{Config, Pool};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use tracing_subscriber::EnvFilter;

const PRODUCERS: u64 = 4;
const PER_PRODUCER: u64 = 250_000;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let sum = Arc::new(AtomicU64::new(0));
    let sum_clone = sum.clone();
    let config = Config::cpu_bound(move |_worker, job: u64| {
        sum_clone.fetch_add(job, Ordering::Relaxed);
    });

    let now = Instant::now();
    let pool = match Pool::init(config) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "pool init failed");
            std::process::exit(1);
        }
    };

    thread::scope(|s| {
        for p in 0..PRODUCERS {
            let pool = &pool;
            s.spawn(move || {
                for job in p * PER_PRODUCER + 1..=(p + 1) * PER_PRODUCER {
                    if pool.enqueue(job).is_err() {
                        tracing::error!(job, "enqueue failed");
                    }
                }
            });
        }
    });

    let total = PRODUCERS * PER_PRODUCER;
    while pool.metrics().work_done < total && pool.running() > 0 {
        thread::sleep(Duration::from_millis(1));
    }
    pool.quit();
    pool.wait_drained(Duration::from_secs(5));

    let metrics = pool.metrics();
    let expected = total * (total + 1) / 2;
    println!(
        "elapsed: {:?}, jobs: {}, sum ok: {}, contention: {}",
        now.elapsed(),
        metrics.work_done,
        sum.load(Ordering::Relaxed) == expected,
        metrics.contention
    );
    if let Err(e) = pool.destroy() {
        tracing::warn!(error = %e, "destroy failed");
    }
}
