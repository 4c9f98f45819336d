//! # weft-runtime
//!
//! Task engine and thread pool scheduler for weft.
//!
//! This crate provides:
//! - `Task<T>`: lazily started, awaitable computations with a single
//!   continuation
//! - `ThreadPool`: fixed worker set with `schedule()` to hop onto a worker
//! - `sync_wait`: block an ordinary thread until a task completes
//! - `Generator<T>`: iterator driven by a frame that yields values
//! - `PoolConfig`: environment-driven pool configuration

pub mod config;
pub mod error;
pub mod task;
pub mod worker;
pub mod pool;
pub mod sync_wait;
pub mod generator;

// Re-exports
pub use config::PoolConfig;
pub use error::{PoolError, PoolResult, TaskError};
pub use task::{Task, TaskState};
pub use worker::current_worker_id;
pub use pool::{PoolHandle, Schedule, ThreadPool};
pub use sync_wait::sync_wait;
pub use generator::{Generator, YieldValue, Yielder};
