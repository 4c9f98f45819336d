//! # weft - tasks, a thread pool and io_uring I/O
//!
//! Suspendable tasks built on `Future`, scheduled onto a fixed pool of
//! worker threads, with futex-based synchronization underneath and an
//! io_uring service for file I/O.
//!
//! ## Quick Start
//!
//! ```ignore
//! use weft::{sync_wait, PoolHandle, Task, TaskError, ThreadPool};
//!
//! fn chain(pool: PoolHandle, depth: usize, leaf: usize) -> Task<usize> {
//!     Task::fallible(async move {
//!         pool.schedule().await; // continue on a worker thread
//!         if depth == leaf {
//!             return Ok::<_, TaskError>(depth);
//!         }
//!         chain(pool, depth + 1, leaf).await
//!     })
//! }
//!
//! let pool = ThreadPool::new(4)?;
//! assert_eq!(sync_wait(chain(pool.handle(), 1, 5))?, 5);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │           Task::new(), schedule().await, sync_wait()        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┴───────────────────┐
//!          ▼                                       ▼
//!    ┌───────────────────────┐           ┌───────────────────────┐
//!    │     ThreadPool        │           │      IoService        │
//!    │ per-worker queues of  │           │ io_uring + eventfd +  │
//!    │ wakers, round robin   │           │ epoll poll thread     │
//!    └───────────────────────┘           └───────────────────────┘
//!          │                                       │
//!          └───────────────────┬───────────────────┘
//!                              ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │                      weft-core                          │
//!    │  futex, locks, condvar, event, queue, lock-free deque   │
//!    └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Environment Variables
//!
//! - `WEFT_LOG_LEVEL` - off, error, warn, info, debug, trace
//! - `WEFT_FLUSH_EPRINT=1` - flush each log line
//! - `WEFT_NUM_THREADS`, `WEFT_THREAD_NAME`, `WEFT_THREAD_STACK_SIZE` - pool
//! - `WEFT_RING_ENTRIES`, `WEFT_POLL_TIMEOUT_MS`, `WEFT_POLL_MAX_EVENTS` - I/O

pub use weft_core::{
    Backoff, CancellationToken, Cancelled, ConditionVariable, Exclusive, ExclusiveGuard,
    LockFreeDeque, Mutex, OneShotEvent, PushError, RawLock, RawMutex, RawSpinLock, SpinLock,
    ThreadSafeQueue,
};

pub use weft_runtime::{
    current_worker_id, sync_wait, Generator, PoolConfig, PoolError, PoolHandle, PoolResult,
    Schedule, Task, TaskError, TaskState, ThreadPool, YieldValue, Yielder,
};

#[cfg(target_os = "linux")]
pub use weft_io::{File, IoConfig, IoError, IoHandle, IoOperation, IoResult, IoService, Mode};

// Logging
pub use weft_core::kprint;
pub use weft_core::kprint::{init as init_logging, set_flush_enabled, set_log_level, LogLevel};
pub use weft_core::{fatal, kdebug, kerror, kinfo, kprintln, ktrace, kwarn};

// Environment helpers
pub use weft_core::{env_get, env_get_bool, env_get_millis, env_get_opt};
