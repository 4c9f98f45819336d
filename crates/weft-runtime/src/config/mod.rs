//! Thread pool configuration
//!
//! Library defaults with runtime environment overrides.
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_runtime::config::PoolConfig;
//!
//! // Use defaults with env overrides
//! let config = PoolConfig::from_env();
//!
//! // Or customize programmatically
//! let config = PoolConfig::from_env()
//!     .num_threads(8)
//!     .thread_name("io-worker");
//! ```

pub mod defaults;

use weft_core::env::{env_get, env_get_opt};

use crate::error::PoolError;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads
    pub num_threads: usize,
    /// Worker thread name prefix
    pub thread_name: String,
    /// Worker stack size; `None` keeps the platform default
    pub stack_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl PoolConfig {
    /// Create config from library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `WEFT_NUM_THREADS` - Number of worker threads
    /// - `WEFT_THREAD_NAME` - Worker thread name prefix
    /// - `WEFT_THREAD_STACK_SIZE` - Worker stack size in bytes
    pub fn from_env() -> Self {
        Self {
            num_threads: env_get("WEFT_NUM_THREADS", defaults::num_threads()),
            thread_name: env_get("WEFT_THREAD_NAME", defaults::THREAD_NAME.to_string()),
            stack_size: env_get_opt("WEFT_THREAD_STACK_SIZE"),
        }
    }

    /// Create config with library defaults (no env override).
    pub fn new() -> Self {
        Self {
            num_threads: defaults::num_threads(),
            thread_name: defaults::THREAD_NAME.to_string(),
            stack_size: None,
        }
    }

    // Builder methods

    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = n;
        self
    }

    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.num_threads == 0 {
            return Err(PoolError::InvalidConfig("num_threads must be > 0"));
        }
        if self.num_threads > defaults::MAX_THREADS {
            return Err(PoolError::InvalidConfig("num_threads must be <= 1024"));
        }
        if self.thread_name.contains('\0') {
            return Err(PoolError::InvalidConfig("thread_name must not contain NUL"));
        }
        if let Some(size) = self.stack_size {
            if size < defaults::MIN_STACK_SIZE {
                return Err(PoolError::InvalidConfig("stack_size must be >= 64KB"));
            }
        }
        Ok(())
    }
}
