//! Idle backoff for workers facing an empty queue.
//!
//! Everything here is pure so the schedule can be replayed in tests; the
//! worker turns the returned unit count into an actual sleep.

/// Pseudo-random delay, in backoff units, for `worker_id` on its `retry`-th
/// consecutive empty dequeue. Always `< 2^max_backoff`.
pub fn backoff_delay(worker_id: usize, retry: usize, max_backoff: u32) -> u64 {
    let max_backoff = max_backoff.min(63);
    let mask = (1u64 << max_backoff) - 1;

    // splitmix seed so that worker 0 and retry 0 still produce a live state
    let mut state = (((worker_id as u64) << 32) ^ retry as u64).wrapping_add(0x9E37_79B9_7F4A_7C15);
    state = (state ^ (state >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    state = (state ^ (state >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    state ^= state >> 31;

    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;

    state & mask
}

/// What a worker should do after an empty dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Sleep(u64),
    Terminate,
}

/// Per-worker retry counter driving the empty-queue state machine.
#[derive(Debug, Clone)]
pub struct RetryState {
    worker_id: usize,
    retries: usize,
    max_retries: usize,
    max_backoff: u32,
}

impl RetryState {
    pub fn new(worker_id: usize, max_retries: usize, max_backoff: u32) -> Self {
        Self {
            worker_id,
            retries: 0,
            max_retries,
            max_backoff,
        }
    }

    pub fn retries(&self) -> usize {
        self.retries
    }

    /// Called after a successful dequeue.
    #[inline]
    pub fn reset(&mut self) {
        self.retries = 0;
    }

    pub fn on_empty(&mut self) -> Step {
        self.retries = self.retries.saturating_add(1);
        if self.retries >= self.max_retries {
            return Step::Terminate;
        }
        Step::Sleep(backoff_delay(self.worker_id, self.retries, self.max_backoff))
    }
}
