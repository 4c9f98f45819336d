//! # weft-core
//!
//! Synchronization primitives and concurrent containers for the weft runtime.
//!
//! Nothing in this crate knows about tasks or rings; `weft-runtime` and
//! `weft-io` build on top of it.
//!
//! ## Modules
//!
//! - `backoff` - Adaptive spin strategy (busy-wait escalating to yield)
//! - `futex` - 32-bit wait/wake word (futex on Linux, condvar elsewhere)
//! - `lock` - `RawLock` capability with spin and futex mutex implementations
//! - `exclusive` - Value + lock wrapper exposing `with_lock`
//! - `condvar` - Predicate wait over an `Exclusive`, cancellation aware
//! - `event` - One-shot cross-thread signal
//! - `cancel` - Cancellation token for cooperative cancellation
//! - `queue` - Unbounded blocking FIFO
//! - `deque` - Lock-free bounded double-ended queue
//! - `error` - Error types
//! - `kprint` - Kernel-style leveled logging macros
//! - `env` - Environment variable utilities

pub mod backoff;
pub mod futex;
pub mod lock;
pub mod exclusive;
pub mod condvar;
pub mod event;
pub mod cancel;
pub mod queue;
pub mod deque;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use backoff::Backoff;
pub use futex::Futex;
pub use lock::{RawLock, RawMutex, RawSpinLock};
pub use exclusive::{Exclusive, ExclusiveGuard, Mutex, SpinLock};
pub use condvar::ConditionVariable;
pub use event::OneShotEvent;
pub use cancel::CancellationToken;
pub use queue::ThreadSafeQueue;
pub use deque::LockFreeDeque;
pub use error::{Cancelled, PushError};
pub use env::{env_get, env_get_bool, env_get_millis, env_get_opt};
