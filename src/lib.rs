//! Пул воркеров фиксированного размера поверх неограниченной lock-free MPMC очереди
//!
//! # Features
//! - Очередь Michael–Scott с помощью отстающему tail
//! - Epoch-based освобождение узлов (без немедленного free)
//! - Случайный backoff при простое и бюджет повторов на воркера
//! - Стартовый rendezvous, кооперативный quit, детект drain
//! - Счетчики по воркерам и метрики пула

pub mod backoff;
pub mod config;
pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod queue;
pub mod reclaim;
mod rendezvous;
mod worker;

pub use config::{Config, Engine};
pub use errors::{AllocError, DestroyError, Empty, InitError};
pub use handle::QueueHandle;
pub use model::{PoolMetrics, PoolStatus, WorkerInfo, WorkerState, WorkerStats};
pub use pool::Pool;
pub use queue::LockFreeQueue;
