use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use crossbeam::utils::CachePadded;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    errors::{AllocError, DestroyError, Empty, InitError},
    handle::QueueHandle,
    model::{PoolMetrics, PoolStatus, WorkerInfo, WorkerState},
    queue::LockFreeQueue,
    rendezvous::Rendezvous,
    worker::{spawn_worker, WorkerSlot},
};

/// Общее состояние владельца пула и воркеров
pub(crate) struct PoolShared<T> {
    pub config: Config<T>,
    pub queue: LockFreeQueue<T>,
    pub running: CachePadded<AtomicUsize>,
    pub quit: CancellationToken,
    pub rendezvous: Rendezvous,
}

/// Фиксированный набор воркеров, разбирающих одну lock-free очередь.
///
/// Воркер завершается сам, если очередь пуста весь его бюджет повторов.
/// [`Pool::quit`] просит остальных остановиться между задачами.
pub struct Pool<T: Send + 'static> {
    shared: Arc<PoolShared<T>>,
    slots: Vec<Arc<CachePadded<WorkerSlot>>>,
    threads: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> Pool<T> {
    /// Валидирует конфиг, запускает всех воркеров и ждет, пока все стартуют
    pub fn init(config: Config<T>) -> Result<Self, InitError> {
        let config = config.validate();
        let parallelism = config.max_threads;
        tracing::info!(
            parallelism,
            max_backoff = config.max_backoff,
            max_retries = config.max_retries,
            backoff_unit = ?config.backoff_unit,
            "starting pool"
        );

        let shared = Arc::new(PoolShared {
            config,
            queue: LockFreeQueue::new(),
            running: CachePadded::new(AtomicUsize::new(0)),
            quit: CancellationToken::new(),
            rendezvous: Rendezvous::new(parallelism),
        });

        let mut slots = Vec::with_capacity(parallelism);
        let mut threads = Vec::with_capacity(parallelism);

        // Held across spawning so no worker can signal before we wait.
        let guard = shared.rendezvous.lock();
        for id in 0..parallelism {
            let slot = Arc::new(CachePadded::new(WorkerSlot::new(id)));
            match spawn_worker(Arc::clone(&slot), Arc::clone(&shared)) {
                Ok(thread) => {
                    slots.push(slot);
                    threads.push(thread);
                }
                Err(source) => {
                    tracing::error!(worker = id, error = %source, "failed to spawn worker");
                    shared.quit.cancel();
                    drop(guard);
                    for thread in threads {
                        let _ = thread.join();
                    }
                    return Err(InitError::Spawn { worker: id, source });
                }
            }
        }
        shared.rendezvous.wait_all(guard, || shared.quit.is_cancelled());
        tracing::info!(running = shared.running.load(Ordering::Acquire), "workers ready");

        Ok(Self {
            shared,
            slots,
            threads,
        })
    }

    /// Можно вызывать из любого потока, в том числе из engine
    #[inline]
    pub fn enqueue(&self, payload: T) -> Result<(), AllocError<T>> {
        self.shared.queue.enqueue(payload)
    }

    pub fn register_handle(&self) -> QueueHandle {
        self.shared.queue.register()
    }

    /// Забирает самую старую задачу мимо воркеров
    #[inline]
    pub fn dequeue(&self, handle: &QueueHandle) -> Result<T, Empty> {
        self.shared.queue.dequeue(handle)
    }

    pub fn parallelism(&self) -> usize {
        self.shared.config.max_threads
    }

    pub fn config(&self) -> &Config<T> {
        &self.shared.config
    }

    /// Live workers. Never increases once start-up has finished.
    pub fn running(&self) -> usize {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Воркеры выходят после текущей задачи или сна
    pub fn quit(&self) {
        if !self.shared.quit.is_cancelled() {
            tracing::info!("quit requested");
        }
        self.shared.quit.cancel();
    }

    pub fn is_quit_requested(&self) -> bool {
        self.shared.quit.is_cancelled()
    }

    pub fn status(&self) -> PoolStatus {
        match (self.running(), self.is_quit_requested()) {
            (0, true) => PoolStatus::Stopped,
            (0, false) => PoolStatus::Drained,
            _ => PoolStatus::Running,
        }
    }

    /// Blocks until no worker is running or `timeout` elapses.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        self.shared
            .rendezvous
            .wait_until(timeout, || self.running() == 0)
    }

    pub fn workers(&self) -> impl Iterator<Item = WorkerInfo> + '_ {
        self.slots.iter().map(|slot| slot.info())
    }

    pub fn queued_len(&self) -> usize {
        self.shared.queue.len()
    }

    /// Visits queued jobs from oldest to newest.
    ///
    /// # Safety
    /// Nothing may dequeue while this runs: every worker must have exited
    /// and no other thread may call [`Pool::dequeue`].
    pub unsafe fn inspect_queued<F>(&self, f: F)
    where
        F: FnMut(&T),
    {
        self.shared.queue.inspect(f)
    }

    pub fn metrics(&self) -> PoolMetrics {
        let reclaimer = self.shared.queue.reclaimer();
        let mut metrics = PoolMetrics {
            parallelism: self.parallelism(),
            running: self.running(),
            queued: self.queued_len(),
            work_done: 0,
            contention: 0,
            panics: 0,
            retired_nodes: reclaimer.retired(),
            reclaimed_nodes: reclaimer.reclaimed(),
            quit_requested: self.is_quit_requested(),
        };
        for info in self.workers() {
            metrics.work_done += info.stats.work_done;
            metrics.contention += info.stats.contention;
            metrics.panics += info.stats.panics;
        }
        metrics
    }

    /// Join всех воркеров и освобождение пула.
    ///
    /// Все воркеры должны быть уже завершены, иначе возвращается
    /// `WorkersAlive` и ничего не разрушается. Drop пула затем сам
    /// выставит quit и дождется потоков.
    pub fn destroy(mut self) -> Result<(), DestroyError> {
        let alive = self
            .workers()
            .filter(|info| info.state == WorkerState::Alive)
            .count();
        if alive > 0 {
            return Err(DestroyError::WorkersAlive { alive });
        }
        self.join_workers();
        tracing::info!("pool destroyed");
        Ok(())
    }

    fn join_workers(&mut self) {
        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                tracing::warn!("worker thread panicked outside the engine");
            }
        }
    }
}

impl<T: Send + 'static> Drop for Pool<T> {
    fn drop(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.shared.quit.cancel();
        self.join_workers();
    }
}
