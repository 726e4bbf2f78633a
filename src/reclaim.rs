//! Deferred reclamation of queue nodes.
//!
//! A thread announces that it may be dereferencing shared nodes by pinning
//! the epoch. Retired nodes are handed to the collector and freed only after
//! every pinned participant has left the epoch in which they were retired, so
//! a node unlinked by one thread is never freed under another thread's feet.
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crossbeam::{
    epoch::{self, Collector, Guard, Shared},
    utils::CachePadded,
};

use crate::handle::QueueHandle;

#[derive(Debug, Default)]
struct Counters {
    retired: CachePadded<AtomicUsize>,
    reclaimed: CachePadded<AtomicUsize>,
}

#[derive(Debug)]
pub struct Reclaimer {
    collector: Collector,
    counters: Arc<Counters>,
}

impl Default for Reclaimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reclaimer {
    /// Shares the process-wide collector, so handle-less producers can pin
    /// through their thread-local participant.
    pub fn new() -> Self {
        Self {
            collector: epoch::default_collector().clone(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Registers a dedicated participant for a long-lived thread.
    pub fn register(&self) -> QueueHandle {
        QueueHandle::new(self.collector.register())
    }

    /// Pins the calling thread's implicit participant.
    #[inline]
    pub fn pin(&self) -> Guard {
        epoch::pin()
    }

    /// Schedules `node` to be freed once no pinned thread can observe it.
    ///
    /// # Safety
    /// `node` must already be unreachable from the shared structure, must be
    /// retired exactly once, and dropping it must not drop any payload that
    /// was moved out.
    pub unsafe fn retire<N>(&self, node: Shared<'_, N>, guard: &Guard) {
        self.counters.retired.fetch_add(1, Ordering::Relaxed);
        let counters = Arc::clone(&self.counters);
        let owned = node.into_owned();
        guard.defer_unchecked(move || {
            drop(owned);
            counters.reclaimed.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Pushes locally buffered garbage to the collector and tries to advance
    /// the epoch.
    pub fn flush(&self) {
        self.pin().flush();
    }

    pub fn retired(&self) -> usize {
        self.counters.retired.load(Ordering::Relaxed)
    }

    pub fn reclaimed(&self) -> usize {
        self.counters.reclaimed.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        self.retired().saturating_sub(self.reclaimed())
    }
}
