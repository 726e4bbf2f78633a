#[cfg(test)]
mod tests {
    use joule_queue::{
        config::{default_threads, DEFAULT_MAX_BACKOFF, DEFAULT_RETRIES, MAX_THREADS},
        Config, DestroyError, Empty, LockFreeQueue, Pool, PoolStatus, WorkerState,
    };
    use std::{
        collections::HashSet,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        thread,
        time::{Duration, Instant},
    };

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    static PANIC_HOOK: Mutex<()> = Mutex::new(());

    /// Runs `f` with panic output muted, then puts the previous hook back.
    fn with_silent_panics<R>(f: impl FnOnce() -> R) -> R {
        let _lock = PANIC_HOOK.lock().unwrap_or_else(|e| e.into_inner());
        let prev = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));
        let result = f();
        std::panic::set_hook(prev);
        result
    }

    fn wait_for<F: Fn() -> bool>(timeout: Duration, done: F) -> bool {
        let deadline = Instant::now() + timeout;
        while !done() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    #[test]
    fn test_out_of_range_config_falls_back() {
        println!("\n=== TEST: config fallbacks ===");
        let config = Config::<u32>::default()
            .with_threads(0)
            .with_backoff(99)
            .with_retries(usize::MAX)
            .validate();
        assert_eq!(config.max_threads, default_threads());
        assert_eq!(config.max_backoff, DEFAULT_MAX_BACKOFF);
        assert_eq!(config.max_retries, DEFAULT_RETRIES);

        let config = Config::<u32>::default().with_threads(MAX_THREADS + 1).validate();
        assert_eq!(config.max_threads, default_threads());

        let config = Config::<u32>::default()
            .with_threads(3)
            .with_backoff(0)
            .with_retries(0)
            .validate();
        assert_eq!((config.max_threads, config.max_backoff, config.max_retries), (3, 0, 0));
        println!("  ✓ out-of-range values replaced, in-range kept");
    }

    #[test]
    fn test_init_waits_for_every_worker() {
        println!("\n=== TEST: start-up rendezvous ===");
        init_tracing();
        let pool = Pool::<u32>::init(
            Config::new(|_, _| {})
                .with_threads(6)
                .with_retries(10_000)
                .with_backoff(2),
        )
        .unwrap();

        assert_eq!(pool.parallelism(), 6);
        assert_eq!(pool.config().max_retries, 10_000);
        assert_eq!(pool.running(), 6);
        assert_eq!(pool.metrics().utilization(), 1.0);
        assert_eq!(pool.status(), PoolStatus::Running);
        let ids: Vec<_> = pool.workers().map(|w| w.id).collect();
        assert_eq!(ids, (0..6).collect::<Vec<_>>());
        assert!(pool.workers().all(|w| w.is_alive()));

        pool.quit();
        assert!(pool.wait_drained(Duration::from_secs(5)));
        pool.destroy().unwrap();
        println!("  ✓ init returned with all workers running");
    }

    #[test]
    fn test_zero_retries_terminates_immediately() {
        println!("\n=== TEST: scenario B, zero retry budget ===");
        init_tracing();
        let pool = Pool::<u32>::init(
            Config::new(|_, _| {})
                .with_threads(1)
                .with_retries(0)
                .with_backoff(10),
        )
        .unwrap();

        // no sleep happens before termination, so this is fast
        assert!(pool.wait_drained(Duration::from_secs(1)));
        assert_eq!(pool.running(), 0);
        assert!(pool.workers().all(|w| w.state == WorkerState::Terminated));
        assert_eq!(pool.status(), PoolStatus::Drained);
        assert!(!pool.is_quit_requested());
        pool.destroy().unwrap();
        println!("  ✓ worker retired on its first empty dequeue");
    }

    #[test]
    fn test_quit_is_distinct_from_drain() {
        println!("\n=== TEST: quit vs idle drain ===");
        init_tracing();
        let pool = Pool::<u32>::init(
            Config::new(|_, _| {})
                .with_threads(3)
                .with_retries(1_000_000)
                .with_backoff(3),
        )
        .unwrap();

        pool.quit();
        assert!(pool.wait_drained(Duration::from_secs(5)));
        assert_eq!(pool.status(), PoolStatus::Stopped);
        assert!(pool.metrics().quit_requested);
        pool.destroy().unwrap();
        println!("  ✓ quit reported as Stopped");
    }

    #[test]
    fn test_destroy_with_live_workers_is_rejected() {
        println!("\n=== TEST: destroy precondition ===");
        init_tracing();
        let pool = Pool::<u32>::init(
            Config::new(|_, _| {})
                .with_threads(2)
                .with_retries(1_000_000)
                .with_backoff(1),
        )
        .unwrap();

        assert_eq!(pool.destroy(), Err(DestroyError::WorkersAlive { alive: 2 }));
        println!("  ✓ destroy refused while workers were alive");
    }

    #[test]
    fn test_workers_process_and_reset() {
        println!("\n=== TEST: dispatch to engine ===");
        init_tracing();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let pool = Pool::init(
            Config::new(move |worker, job: u32| {
                seen_clone.lock().unwrap().push((worker, job));
            })
            .with_threads(2)
            .with_retries(1_000)
            .with_backoff(2),
        )
        .unwrap();

        for job in 0..100 {
            pool.enqueue(job).unwrap();
        }
        assert!(wait_for(Duration::from_secs(10), || pool.metrics().work_done == 100));

        let seen = seen.lock().unwrap();
        let jobs: HashSet<_> = seen.iter().map(|(_, job)| *job).collect();
        assert_eq!(jobs, (0..100).collect());
        assert!(seen.iter().all(|(worker, _)| *worker < 2));

        pool.quit();
        assert!(pool.wait_drained(Duration::from_secs(5)));
        println!("  ✓ 100 jobs dispatched exactly once");
    }

    #[test]
    fn test_engine_panic_is_survivable() {
        println!("\n=== TEST: engine panic ===");
        init_tracing();
        with_silent_panics(|| {
            let done = Arc::new(AtomicUsize::new(0));
            let done_clone = done.clone();
            let pool = Pool::init(
                Config::new(move |_, job: u32| {
                    if job % 10 == 0 {
                        panic!("job {job} failed");
                    }
                    done_clone.fetch_add(1, Ordering::Relaxed);
                })
                .with_threads(1)
                .with_retries(1_000)
                .with_backoff(1),
            )
            .unwrap();

            for job in 0..50 {
                pool.enqueue(job).unwrap();
            }
            assert!(wait_for(Duration::from_secs(10), || {
                let m = pool.metrics();
                m.work_done + m.panics == 50
            }));

            let metrics = pool.metrics();
            assert_eq!(metrics.panics, 5);
            assert_eq!(metrics.work_done, 45);
            assert_eq!(done.load(Ordering::Relaxed), 45);
            assert_eq!(pool.running(), 1);

            pool.quit();
            assert!(pool.wait_drained(Duration::from_secs(5)));
        });
        println!("  ✓ worker kept running after panics");
    }

    #[test]
    fn test_panicking_job_restarts_idle_streak() {
        println!("\n=== TEST: idle streak after a panicking job ===");
        init_tracing();
        with_silent_panics(|| {
            let pool = Pool::init(
                Config::new(|_, job: u32| {
                    if job == 0 {
                        panic!("bad job");
                    }
                })
                .with_threads(1)
                .with_retries(1_000_000)
                .with_backoff(2)
                .with_backoff_unit(Duration::from_millis(5)),
            )
            .unwrap();
            let streak = || pool.workers().next().map_or(0, |w| w.stats.idle_streak);

            assert!(wait_for(Duration::from_secs(10), || streak() >= 40));
            pool.enqueue(0).unwrap();
            assert!(wait_for(Duration::from_secs(10), || pool.metrics().panics == 1));
            // empty retries average several ms here: the count restarted instead of carrying on
            assert!(streak() < 20, "idle streak kept counting: {}", streak());
            assert_eq!(pool.metrics().work_done, 0);

            pool.quit();
            assert!(pool.wait_drained(Duration::from_secs(5)));
        });
        println!("  ✓ retry count reset by the dequeue, not the engine outcome");
    }

    #[test]
    fn test_direct_dequeue_and_inspect() {
        println!("\n=== TEST: direct dequeue and inspection ===");
        init_tracing();
        let pool = Pool::<u32>::init(Config::new(|_, _| {}).with_threads(1).with_retries(0)).unwrap();
        assert!(pool.wait_drained(Duration::from_secs(1)));

        for job in 1..=5 {
            pool.enqueue(job).unwrap();
        }
        assert_eq!(pool.queued_len(), 5);

        let mut queued = Vec::new();
        unsafe { pool.inspect_queued(|job| queued.push(*job)) };
        assert_eq!(queued, vec![1, 2, 3, 4, 5]);

        let handle = pool.register_handle();
        assert_eq!(pool.dequeue(&handle), Ok(1));
        assert_eq!(pool.dequeue(&handle), Ok(2));
        assert_eq!(pool.queued_len(), 3);
        let metrics = pool.metrics();
        assert_eq!(metrics.retired_nodes, 2);
        assert!(metrics.pending_reclaim() <= 2);
        assert_eq!(metrics.utilization(), 0.0);
        pool.destroy().unwrap();
        println!("  ✓ FIFO order via direct dequeue");
    }

    #[test]
    fn test_queue_fifo_single_thread() {
        println!("\n=== TEST: queue FIFO ===");
        let queue = LockFreeQueue::new();
        let handle = queue.register();
        assert!(!handle.is_pinned());
        for i in 0..1_000 {
            queue.enqueue_with(&handle, i).unwrap();
        }
        assert_eq!(queue.len(), 1_000);
        for i in 0..1_000 {
            assert_eq!(queue.dequeue(&handle), Ok(i));
        }
        assert_eq!(queue.dequeue(&handle), Err(Empty));
        assert_eq!(queue.node_count(), 1);
        assert_eq!(handle.contention(), 0);
        println!("  ✓ items came back in order");
    }

    #[test]
    fn test_reclaimer_never_frees_ahead_of_retire() {
        println!("\n=== TEST: reclamation accounting ===");
        let queue = LockFreeQueue::new();
        let handle = queue.register();
        for round in 0..50 {
            for i in 0..100 {
                queue.enqueue(format!("job-{round}-{i}")).unwrap();
            }
            while queue.dequeue(&handle).is_ok() {}
            queue.reclaimer().flush();
            assert!(queue.reclaimer().reclaimed() <= queue.reclaimer().retired());
        }
        assert_eq!(queue.reclaimer().retired(), 5_000);
        println!(
            "  ✓ retired {}, reclaimed {}",
            queue.reclaimer().retired(),
            queue.reclaimer().reclaimed()
        );
    }
}
