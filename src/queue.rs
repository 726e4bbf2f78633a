//! Unbounded multi-producer multi-consumer FIFO (Michael–Scott).
//!
//! The list always starts with a dummy node whose payload slot is empty.
//! `head` points at the dummy, `tail` at the last node or one link behind it.
//! A successful dequeue moves the payload out of `head.next`, which then
//! becomes the new dummy, and retires the old one through the [`Reclaimer`].
use std::{
    alloc::{self, Layout},
    cell::Cell,
    mem::MaybeUninit,
    sync::atomic::Ordering,
};

use crossbeam::{
    epoch::{self, Atomic, Guard, Owned, Shared},
    utils::{Backoff, CachePadded},
};

use crate::{
    errors::{AllocError, Empty},
    handle::QueueHandle,
    reclaim::Reclaimer,
};

struct Node<T> {
    payload: MaybeUninit<T>,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    fn dummy() -> Owned<Self> {
        Owned::new(Node {
            payload: MaybeUninit::uninit(),
            next: Atomic::null(),
        })
    }

    /// Allocates through the global allocator so exhaustion surfaces as an
    /// error instead of aborting.
    fn try_new(payload: T) -> Result<Owned<Self>, AllocError<T>> {
        let layout = Layout::new::<Self>();
        // Node always holds a pointer, so the layout is never zero-sized.
        let raw = unsafe { alloc::alloc(layout) } as *mut Self;
        if raw.is_null() {
            return Err(AllocError(payload));
        }
        unsafe {
            raw.write(Node {
                payload: MaybeUninit::new(payload),
                next: Atomic::null(),
            });
            Ok(Owned::from_raw(raw))
        }
    }
}

/// Swings `target` from `current` to `next`, finishing a step some other
/// thread left incomplete. Losing the race is fine: it means someone else
/// already moved the pointer forward.
#[inline]
pub(crate) fn help_advance<'g, N>(
    target: &Atomic<N>,
    current: Shared<'g, N>,
    next: Shared<'g, N>,
    guard: &'g Guard,
) -> bool {
    target
        .compare_exchange(current, next, Ordering::Release, Ordering::Relaxed, guard)
        .is_ok()
}

#[inline]
fn contended(counter: &Cell<u64>, backoff: &Backoff) {
    counter.set(counter.get() + 1);
    backoff.spin();
}

pub struct LockFreeQueue<T> {
    head: CachePadded<Atomic<Node<T>>>,
    tail: CachePadded<Atomic<Node<T>>>,
    reclaimer: Reclaimer,
}

// Payloads only ever move between threads by value.
unsafe impl<T: Send> Send for LockFreeQueue<T> {}
unsafe impl<T: Send> Sync for LockFreeQueue<T> {}

impl<T> Default for LockFreeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LockFreeQueue<T> {
    pub fn new() -> Self {
        let queue = Self {
            head: CachePadded::new(Atomic::null()),
            tail: CachePadded::new(Atomic::null()),
            reclaimer: Reclaimer::new(),
        };
        let dummy = Node::dummy().into_shared(unsafe { epoch::unprotected() });
        queue.head.store(dummy, Ordering::Relaxed);
        queue.tail.store(dummy, Ordering::Relaxed);
        queue
    }

    pub fn reclaimer(&self) -> &Reclaimer {
        &self.reclaimer
    }

    pub fn register(&self) -> QueueHandle {
        self.reclaimer.register()
    }

    /// Appends `payload` from any thread without a registered handle.
    pub fn enqueue(&self, payload: T) -> Result<(), AllocError<T>> {
        let guard = self.reclaimer.pin();
        self.enqueue_pinned(payload, &guard, &Cell::new(0))
    }

    /// Appends `payload`, charging CAS contention to `handle`.
    pub fn enqueue_with(&self, handle: &QueueHandle, payload: T) -> Result<(), AllocError<T>> {
        let guard = handle.pin();
        self.enqueue_pinned(payload, &guard, handle.counter())
    }

    fn enqueue_pinned(&self, payload: T, guard: &Guard, contention: &Cell<u64>) -> Result<(), AllocError<T>> {
        let new = Node::try_new(payload)?.into_shared(guard);
        let backoff = Backoff::new();

        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            // tail is never null and never retired while we are pinned
            let tail_ref = unsafe { tail.deref() };
            let next = tail_ref.next.load(Ordering::Acquire, guard);

            if tail != self.tail.load(Ordering::Acquire, guard) {
                contended(contention, &backoff);
                continue;
            }

            if !next.is_null() {
                // another append is half done
                help_advance(&self.tail, tail, next, guard);
                contended(contention, &backoff);
                continue;
            }

            if tail_ref
                .next
                .compare_exchange(Shared::null(), new, Ordering::Release, Ordering::Relaxed, guard)
                .is_ok()
            {
                help_advance(&self.tail, tail, new, guard);
                return Ok(());
            }
            contended(contention, &backoff);
        }
    }

    /// Removes the oldest item.
    pub fn dequeue(&self, handle: &QueueHandle) -> Result<T, Empty> {
        let guard = handle.pin();
        let contention = handle.counter();
        let backoff = Backoff::new();

        loop {
            let head = self.head.load(Ordering::Acquire, &guard);
            let tail = self.tail.load(Ordering::Acquire, &guard);
            let next = unsafe { head.deref() }.next.load(Ordering::Acquire, &guard);

            if head != self.head.load(Ordering::Acquire, &guard) {
                contended(contention, &backoff);
                continue;
            }

            let Some(next_ref) = (unsafe { next.as_ref() }) else {
                return Err(Empty);
            };

            if head == tail {
                // tail lags behind a completed link
                help_advance(&self.tail, tail, next, &guard);
                contended(contention, &backoff);
                continue;
            }

            if self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Relaxed, &guard)
                .is_ok()
            {
                unsafe {
                    // only the CAS winner reads the slot; `next` is now the dummy
                    let payload = next_ref.payload.assume_init_read();
                    self.reclaimer.retire(head, &guard);
                    return Ok(payload);
                }
            }
            contended(contention, &backoff);
        }
    }

    pub fn is_empty(&self) -> bool {
        let guard = self.reclaimer.pin();
        let head = self.head.load(Ordering::Acquire, &guard);
        unsafe { head.deref() }.next.load(Ordering::Acquire, &guard).is_null()
    }

    /// Nodes currently linked, dummy included. Only exact when no other
    /// thread is mutating the queue.
    pub fn node_count(&self) -> usize {
        let guard = self.reclaimer.pin();
        let mut count = 0;
        let mut current = self.head.load(Ordering::Acquire, &guard);
        while let Some(node) = unsafe { current.as_ref() } {
            count += 1;
            current = node.next.load(Ordering::Acquire, &guard);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.node_count().saturating_sub(1)
    }

    /// Visits every queued payload from oldest to newest.
    ///
    /// # Safety
    /// No dequeue may run concurrently: a dequeue moves a payload out of the
    /// node this walk may be reading.
    pub unsafe fn inspect<F>(&self, mut f: F)
    where
        F: FnMut(&T),
    {
        let guard = self.reclaimer.pin();
        let head = self.head.load(Ordering::Acquire, &guard);
        let mut current = head.deref().next.load(Ordering::Acquire, &guard);
        while let Some(node) = current.as_ref() {
            f(node.payload.assume_init_ref());
            current = node.next.load(Ordering::Acquire, &guard);
        }
    }
}

impl<T> Drop for LockFreeQueue<T> {
    fn drop(&mut self) {
        unsafe {
            let guard = epoch::unprotected();
            let head = self.head.load(Ordering::Relaxed, guard);
            let mut current = head.deref().next.load(Ordering::Relaxed, guard);
            drop(head.into_owned());

            while !current.is_null() {
                let mut node = current.into_owned();
                current = node.next.load(Ordering::Relaxed, guard);
                node.payload.assume_init_drop();
            }
        }
    }
}
