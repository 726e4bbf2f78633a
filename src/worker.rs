use std::{
    io,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crossbeam::utils::CachePadded;

use crate::{
    backoff::{RetryState, Step},
    model::{WorkerInfo, WorkerState, WorkerStats},
    pool::PoolShared,
};

/// Bookkeeping for one worker slot. Written only by its worker; the owner
/// reads relaxed snapshots.
#[derive(Debug)]
pub(crate) struct WorkerSlot {
    id: usize,
    state: AtomicU8,
    work_done: AtomicU64,
    contention: AtomicU64,
    panics: AtomicU64,
    idle_streak: AtomicU64,
}

impl WorkerSlot {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            state: AtomicU8::new(WorkerState::Alive.as_u8()),
            work_done: AtomicU64::new(0),
            contention: AtomicU64::new(0),
            panics: AtomicU64::new(0),
            idle_streak: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn info(&self) -> WorkerInfo {
        WorkerInfo {
            id: self.id,
            state: self.state(),
            stats: WorkerStats {
                work_done: self.work_done.load(Ordering::Relaxed),
                contention: self.contention.load(Ordering::Relaxed),
                panics: self.panics.load(Ordering::Relaxed),
                idle_streak: self.idle_streak.load(Ordering::Relaxed),
            },
        }
    }

    fn terminate(&self) {
        self.state
            .store(WorkerState::Terminated.as_u8(), Ordering::Release);
    }
}

pub(crate) fn spawn_worker<T>(
    slot: Arc<CachePadded<WorkerSlot>>,
    shared: Arc<PoolShared<T>>,
) -> io::Result<JoinHandle<()>>
where
    T: Send + 'static,
{
    thread::Builder::new()
        .name(format!("jq-worker-{}", slot.id))
        .spawn(move || run(&slot, &shared))
}

fn run<T>(slot: &WorkerSlot, shared: &PoolShared<T>) {
    let id = slot.id;
    let config = &shared.config;

    shared.rendezvous.arrive(|| {
        shared.running.fetch_add(1, Ordering::AcqRel);
    });
    tracing::debug!(worker = id, "worker started");

    let handle = shared.queue.register();
    let mut retry = RetryState::new(id, config.max_retries, config.max_backoff);

    while !shared.quit.is_cancelled() {
        let result = shared.queue.dequeue(&handle);
        slot.contention.store(handle.contention(), Ordering::Relaxed);

        match result {
            Ok(payload) => {
                // a dequeued job ends the idle streak even if the engine panics
                retry.reset();
                slot.idle_streak.store(0, Ordering::Relaxed);

                let engine = &config.engine;
                if panic::catch_unwind(AssertUnwindSafe(|| engine(id, payload))).is_err() {
                    slot.panics.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(worker = id, "engine panicked, continuing");
                    continue;
                }
                slot.work_done.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => match retry.on_empty() {
                Step::Sleep(units) => {
                    slot.idle_streak.store(retry.retries() as u64, Ordering::Relaxed);
                    tracing::trace!(worker = id, retry = retry.retries(), units, "queue empty, backing off");
                    let nap = config
                        .backoff_unit
                        .saturating_mul(u32::try_from(units).unwrap_or(u32::MAX));
                    thread::sleep(nap);
                }
                Step::Terminate => {
                    tracing::debug!(worker = id, retries = retry.retries(), "retry budget exhausted");
                    break;
                }
            },
        }
    }

    slot.terminate();
    let remaining = shared.running.fetch_sub(1, Ordering::AcqRel) - 1;
    shared.rendezvous.notify();
    tracing::debug!(worker = id, remaining, quit = shared.quit.is_cancelled(), "worker exited");
}
