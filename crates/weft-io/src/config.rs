//! I/O service configuration
//!
//! Environment variables (all optional):
//! - `WEFT_RING_ENTRIES` - Submission queue size
//! - `WEFT_POLL_TIMEOUT_MS` - Poll thread `epoll_wait` timeout
//! - `WEFT_POLL_MAX_EVENTS` - Events fetched per `epoll_wait`

use std::time::Duration;

use weft_core::env::{env_get, env_get_millis};

use crate::error::IoError;

pub const DEFAULT_RING_ENTRIES: u32 = 256;
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 100;
pub const DEFAULT_MAX_EVENTS: usize = 256;

/// Largest SQ size the kernel accepts
const MAX_RING_ENTRIES: u32 = 32768;

#[derive(Debug, Clone)]
pub struct IoConfig {
    pub ring_entries: u32,
    /// Upper bound on how long the poll thread sleeps between checks
    /// of its cancellation token
    pub poll_timeout: Duration,
    pub max_events: usize,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl IoConfig {
    pub fn from_env() -> Self {
        Self {
            ring_entries: env_get("WEFT_RING_ENTRIES", DEFAULT_RING_ENTRIES),
            poll_timeout: env_get_millis("WEFT_POLL_TIMEOUT_MS", DEFAULT_POLL_TIMEOUT_MS),
            max_events: env_get("WEFT_POLL_MAX_EVENTS", DEFAULT_MAX_EVENTS),
        }
    }

    pub fn new() -> Self {
        Self {
            ring_entries: DEFAULT_RING_ENTRIES,
            poll_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
            max_events: DEFAULT_MAX_EVENTS,
        }
    }

    // Builder methods

    pub fn ring_entries(mut self, n: u32) -> Self {
        self.ring_entries = n;
        self
    }

    pub fn poll_timeout(mut self, d: Duration) -> Self {
        self.poll_timeout = d;
        self
    }

    pub fn max_events(mut self, n: usize) -> Self {
        self.max_events = n;
        self
    }

    /// Errors are reported as `IoError::RingSetup(EINVAL)`, the errno the
    /// kernel would give for the same values.
    pub fn validate(&self) -> Result<(), IoError> {
        if self.ring_entries == 0 || self.ring_entries > MAX_RING_ENTRIES {
            return Err(IoError::RingSetup(libc::EINVAL));
        }
        if self.max_events == 0 {
            return Err(IoError::Epoll(libc::EINVAL));
        }
        Ok(())
    }

    /// `poll_timeout` as an epoll timeout in milliseconds
    pub(crate) fn poll_timeout_ms(&self) -> u16 {
        u16::try_from(self.poll_timeout.as_millis()).unwrap_or(u16::MAX)
    }
}
