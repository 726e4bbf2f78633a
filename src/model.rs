#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    Alive,
    Terminated,
}

impl WorkerState {
    pub(crate) const fn as_u8(self) -> u8 {
        match self {
            WorkerState::Alive => 0,
            WorkerState::Terminated => 1,
        }
    }

    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => WorkerState::Alive,
            _ => WorkerState::Terminated,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub work_done: u64,
    pub contention: u64,
    pub panics: u64,
    /// Consecutive empty dequeues since the last job.
    pub idle_streak: u64,
}

/// Point-in-time view of one worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerInfo {
    pub id: usize,
    pub state: WorkerState,
    pub stats: WorkerStats,
}

impl WorkerInfo {
    pub fn is_alive(&self) -> bool {
        self.state == WorkerState::Alive
    }
}

/// How a pool got to where it is.
///
/// `Drained` and `Stopped` both mean no worker is running. They differ in
/// whether [`crate::Pool::quit`] was ever called: a drained pool lost every
/// worker to its idle retry budget, a stopped pool was told to shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    Running,
    Drained,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub parallelism: usize,
    pub running: usize,
    pub queued: usize,
    pub work_done: u64,
    pub contention: u64,
    pub panics: u64,
    pub retired_nodes: usize,
    pub reclaimed_nodes: usize,
    pub quit_requested: bool,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.parallelism == 0 {
            return 0.0;
        }
        self.running as f64 / self.parallelism as f64
    }

    pub fn pending_reclaim(&self) -> usize {
        self.retired_nodes.saturating_sub(self.reclaimed_nodes)
    }
}
