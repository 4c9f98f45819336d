//! 32-bit wait/wake word
//!
//! `Futex` is the single blocking primitive under `RawMutex`,
//! `ConditionVariable` and `OneShotEvent`. Callers own the meaning of the
//! value; this type only offers "sleep while the word equals X" and
//! "wake sleepers on this word".
//!
//! Platform-specific implementations use the most efficient primitive
//! available: the futex syscall on Linux, a mutex/condvar pair elsewhere.

use std::sync::atomic::AtomicU32;
use std::time::Duration;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod linux;
        use linux::Parker;
    } else {
        mod fallback;
        use fallback::Parker;
    }
}

pub struct Futex {
    word: AtomicU32,
    parker: Parker,
}

impl Futex {
    pub const fn new(value: u32) -> Self {
        Self {
            word: AtomicU32::new(value),
            parker: Parker::new(),
        }
    }

    /// The futex word. All state changes go through this atomic.
    #[inline]
    pub fn value(&self) -> &AtomicU32 {
        &self.word
    }

    /// Block while the word equals `expected`.
    ///
    /// Returns `false` only on timeout. A `true` return may still be
    /// spurious, so callers re-check their condition.
    #[inline]
    pub fn wait(&self, expected: u32, timeout: Option<Duration>) -> bool {
        self.parker.wait(&self.word, expected, timeout)
    }

    /// Wake at most one waiter. Call after changing the word.
    #[inline]
    pub fn wake_one(&self) {
        self.parker.wake(&self.word, 1);
    }

    /// Wake every waiter. Call after changing the word.
    #[inline]
    pub fn wake_all(&self) {
        self.parker.wake(&self.word, i32::MAX);
    }
}

impl Default for Futex {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for Futex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Futex")
            .field("word", &self.word)
            .finish()
    }
}
