//! # weft-io
//!
//! io_uring-backed asynchronous I/O for weft (Linux only).
//!
//! ```rust,ignore
//! let mut io = IoService::new()?;
//! io.enable_poll_events()?;
//!
//! let op = io.read(fd, vec![0u8; 4096], 0);
//! io.flush()?;
//! let (n, buf) = op.await; // or op.wait() from a plain thread
//! ```
//!
//! ## Modules
//!
//! - `service` - `IoService`, `IoHandle` and the poll thread
//! - `op` - `IoOperation` handles
//! - `file` - Positional file wrapper
//! - `config` - `IoConfig` with environment overrides
//! - `error` - `IoError`

#![cfg(target_os = "linux")]

pub mod config;
pub mod error;
pub mod file;
pub mod op;
pub mod service;

mod eventfd;
mod ring;

pub use config::IoConfig;
pub use error::{IoError, IoResult};
pub use file::{File, Mode};
pub use op::IoOperation;
pub use service::{IoHandle, IoService};
