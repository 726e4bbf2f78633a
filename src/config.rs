use std::{fmt, sync::Arc, time::Duration};

/// Processing callback invoked by a worker with `(worker_id, payload)`.
pub type Engine<T> = Arc<dyn Fn(usize, T) + Send + Sync + 'static>;

pub const MAX_THREADS: usize = 256;
pub const MAX_BACKOFF: u32 = 16;
pub const DEFAULT_MAX_BACKOFF: u32 = 4;
pub const MAX_RETRIES: usize = 1 << 20;
pub const DEFAULT_RETRIES: usize = 8;
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_millis(1);

pub fn default_threads() -> usize {
    num_cpus::get().clamp(1, MAX_THREADS)
}

fn default_engine<T: 'static>() -> Engine<T> {
    Arc::new(|worker, _payload: T| {
        tracing::debug!(worker, "job processed by default engine");
    })
}

/// Pool configuration.
///
/// Numeric fields outside their documented range are not errors:
/// [`Config::validate`] replaces them with the matching default.
pub struct Config<T> {
    pub engine: Engine<T>,
    /// Worker count, `1..=MAX_THREADS`.
    pub max_threads: usize,
    /// Backoff exponent; a single sleep is below `2^max_backoff` units.
    pub max_backoff: u32,
    /// Consecutive empty dequeues a worker tolerates before exiting.
    pub max_retries: usize,
    pub backoff_unit: Duration,
}

impl<T: 'static> Default for Config<T> {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            max_threads: default_threads(),
            max_backoff: DEFAULT_MAX_BACKOFF,
            max_retries: DEFAULT_RETRIES,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }
}

impl<T> Clone for Config<T> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            max_threads: self.max_threads,
            max_backoff: self.max_backoff,
            max_retries: self.max_retries,
            backoff_unit: self.backoff_unit,
        }
    }
}

impl<T> fmt::Debug for Config<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("max_threads", &self.max_threads)
            .field("max_backoff", &self.max_backoff)
            .field("max_retries", &self.max_retries)
            .field("backoff_unit", &self.backoff_unit)
            .finish_non_exhaustive()
    }
}

impl<T: 'static> Config<T> {
    pub fn new<F>(engine: F) -> Self
    where
        F: Fn(usize, T) + Send + Sync + 'static,
    {
        Self {
            engine: Arc::new(engine),
            ..Default::default()
        }
    }

    /// One worker per core, and a retry budget long enough to ride out
    /// short gaps between bursts of work.
    pub fn cpu_bound<F>(engine: F) -> Self
    where
        F: Fn(usize, T) + Send + Sync + 'static,
    {
        Self {
            engine: Arc::new(engine),
            max_threads: default_threads(),
            max_backoff: 6,
            max_retries: 64,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }

    pub fn with_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn with_backoff(mut self, max_backoff: u32) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn with_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Replaces every out-of-range field with its default.
    pub fn validate(mut self) -> Self {
        if self.max_threads == 0 || self.max_threads > MAX_THREADS {
            let fallback = default_threads();
            tracing::warn!(requested = self.max_threads, fallback, "max_threads out of range");
            self.max_threads = fallback;
        }
        if self.max_backoff > MAX_BACKOFF {
            tracing::warn!(
                requested = self.max_backoff,
                fallback = DEFAULT_MAX_BACKOFF,
                "max_backoff out of range"
            );
            self.max_backoff = DEFAULT_MAX_BACKOFF;
        }
        if self.max_retries > MAX_RETRIES {
            tracing::warn!(
                requested = self.max_retries,
                fallback = DEFAULT_RETRIES,
                "max_retries out of range"
            );
            self.max_retries = DEFAULT_RETRIES;
        }
        self
    }
}
