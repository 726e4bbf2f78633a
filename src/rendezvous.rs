use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Condvar, Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant},
};

/// The pool's only lock/condvar pair.
///
/// During start-up the owner holds the lock while spawning and then waits
/// for every worker to arrive. Afterwards the same condvar carries worker
/// exit notifications to anyone blocked in [`Rendezvous::wait_until`].
#[derive(Debug)]
pub(crate) struct Rendezvous {
    lock: Mutex<()>,
    signal: Condvar,
    arrived: AtomicUsize,
    target: usize,
}

impl Rendezvous {
    pub fn new(target: usize) -> Self {
        Self {
            lock: Mutex::new(()),
            signal: Condvar::new(),
            arrived: AtomicUsize::new(0),
            target,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks one worker as started. `on_arrive` runs under the lock so the
    /// owner observes its effect before being woken.
    pub fn arrive<F: FnOnce()>(&self, on_arrive: F) -> usize {
        let _guard = self.lock();
        on_arrive();
        let arrived = self.arrived.fetch_add(1, Ordering::AcqRel) + 1;
        if arrived == self.target {
            self.signal.notify_all();
        }
        arrived
    }

    /// Blocks until `target` workers have arrived or `abort` turns true.
    /// Consumes the guard taken before spawning.
    pub fn wait_all<F>(&self, mut guard: MutexGuard<'_, ()>, abort: F)
    where
        F: Fn() -> bool,
    {
        while self.arrived.load(Ordering::Acquire) < self.target && !abort() {
            guard = self
                .signal
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn notify(&self) {
        let _guard = self.lock();
        self.signal.notify_all();
    }

    /// Waits until `done` holds or `timeout` elapses; returns the final
    /// value of `done`.
    pub fn wait_until<F>(&self, timeout: Duration, done: F) -> bool
    where
        F: Fn() -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock();
        while !done() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = self
                .signal
                .wait_timeout(guard, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
        true
    }
}
