//! Adaptive backoff for contended retry loops
//!
//! Each `pause()` doubles the number of `spin_loop` hints issued, up to
//! `SPIN_LIMIT`; past that it yields the OS thread instead. Never sleeps and
//! never blocks in the kernel.

/// Spin steps before switching to `thread::yield_now`
const SPIN_LIMIT: u32 = 16;

#[derive(Debug)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    #[inline]
    pub const fn new() -> Self {
        Self { step: 1 }
    }

    /// Wait a little before the caller retries
    #[inline]
    pub fn pause(&mut self) {
        if self.step <= SPIN_LIMIT {
            for _ in 0..self.step {
                core::hint::spin_loop();
            }
            self.step <<= 1;
        } else {
            std::thread::yield_now();
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.step = 1;
    }

    /// True once the busy-wait phase is exhausted
    #[inline]
    pub fn is_yielding(&self) -> bool {
        self.step > SPIN_LIMIT
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
