use std::{error::Error, fmt, io};

use thiserror::Error;

/// A queue node could not be allocated. The rejected payload is handed back.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct AllocError<T>(pub T);

impl<T> AllocError<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for AllocError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AllocError { .. }")
    }
}

impl<T> fmt::Display for AllocError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to allocate a queue node")
    }
}

impl<T> Error for AllocError<T> {}

/// The queue held no items at the moment of the dequeue attempt.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[error("queue is empty")]
pub struct Empty;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to spawn worker thread {worker}")]
    Spawn {
        worker: usize,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DestroyError {
    #[error("{alive} worker(s) are still alive")]
    WorkersAlive { alive: usize },
}
