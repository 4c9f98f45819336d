//! Raw lock implementations
//!
//! `RawLock` is the capability `Exclusive` is generic over. Two
//! implementations are provided:
//!
//! - `RawSpinLock`: test-and-test-and-set with `Backoff`. For critical
//!   sections of a few instructions (task frame hand-off, completion slots).
//! - `RawMutex`: three-state futex mutex. Uncontended lock and unlock are a
//!   single atomic op; contended waiters sleep in the kernel.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::backoff::Backoff;
use crate::futex::Futex;

/// A lock that guards no data.
///
/// # Safety
///
/// Implementations must provide mutual exclusion: after `lock()` or a
/// successful `try_lock()` returns, no other caller may acquire the lock
/// until `unlock()` is called. Acquire must synchronize-with the previous
/// release.
pub unsafe trait RawLock: Send + Sync {
    /// An unlocked instance, usable in `const` contexts
    const INIT: Self;

    fn lock(&self);

    fn try_lock(&self) -> bool;

    /// # Safety
    ///
    /// The lock must be held by the current context.
    unsafe fn unlock(&self);

    /// Racy snapshot, for diagnostics and tests
    fn is_locked(&self) -> bool;
}

// ============================================================================
// Spin lock
// ============================================================================

pub struct RawSpinLock {
    locked: AtomicBool,
}

unsafe impl RawLock for RawSpinLock {
    const INIT: Self = RawSpinLock {
        locked: AtomicBool::new(false),
    };

    #[inline]
    fn lock(&self) {
        let mut backoff = Backoff::new();
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }

            // Spin on a plain load so waiters don't bounce the cache line
            while self.locked.load(Ordering::Relaxed) {
                backoff.pause();
            }
        }
    }

    #[inline]
    fn try_lock(&self) -> bool {
        !self.locked.load(Ordering::Relaxed)
            && self
                .locked
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
    }

    #[inline]
    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Futex mutex
// ============================================================================

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
/// Locked, and at least one thread may be sleeping on the futex
const CONTENDED: u32 = 2;

pub struct RawMutex {
    futex: Futex,
}

impl RawMutex {
    #[cold]
    fn lock_contended(&self) {
        let word = self.futex.value();

        // A short spin catches holders that release quickly
        let mut backoff = Backoff::new();
        while !backoff.is_yielding() {
            if word.load(Ordering::Relaxed) == UNLOCKED
                && word
                    .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                return;
            }
            backoff.pause();
        }

        // Mark contended; if the swap observed UNLOCKED we own it now.
        // Owning from this path leaves the word at CONTENDED, which costs at
        // most one spurious wake on unlock.
        while word.swap(CONTENDED, Ordering::Acquire) != UNLOCKED {
            self.futex.wait(CONTENDED, None);
        }
    }
}

unsafe impl RawLock for RawMutex {
    const INIT: Self = RawMutex {
        futex: Futex::new(UNLOCKED),
    };

    #[inline]
    fn lock(&self) {
        if self
            .futex
            .value()
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            self.lock_contended();
        }
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.futex
            .value()
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    unsafe fn unlock(&self) {
        if self.futex.value().swap(UNLOCKED, Ordering::Release) == CONTENDED {
            self.futex.wake_one();
        }
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.futex.value().load(Ordering::Relaxed) != UNLOCKED
    }
}

impl Default for RawSpinLock {
    fn default() -> Self {
        Self::INIT
    }
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::INIT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::UnsafeCell;
    use std::sync::Arc;
    use std::thread;

    struct Counter<L> {
        lock: L,
        value: UnsafeCell<u64>,
    }

    unsafe impl<L: RawLock> Sync for Counter<L> {}

    fn hammer<L: RawLock + 'static>(lock: L) -> u64 {
        let counter = Arc::new(Counter {
            lock,
            value: UnsafeCell::new(0),
        });
        let mut handles = vec![];

        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for _ in 0..5000 {
                    counter.lock.lock();
                    unsafe {
                        *counter.value.get() += 1;
                        counter.lock.unlock();
                    }
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        counter.lock.lock();
        let total = unsafe { *counter.value.get() };
        unsafe { counter.lock.unlock() };
        total
    }

    #[test]
    fn test_spin_lock_try_lock() {
        let lock = RawSpinLock::INIT;
        assert!(lock.try_lock());
        assert!(lock.is_locked());
        assert!(!lock.try_lock());
        unsafe { lock.unlock() };
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_mutex_try_lock() {
        let lock = RawMutex::INIT;
        assert!(lock.try_lock());
        assert!(!lock.try_lock());
        unsafe { lock.unlock() };
        assert!(lock.try_lock());
        unsafe { lock.unlock() };
    }

    #[test]
    fn test_spin_lock_concurrent() {
        assert_eq!(hammer(RawSpinLock::INIT), 20_000);
    }

    #[test]
    fn test_mutex_concurrent() {
        assert_eq!(hammer(RawMutex::INIT), 20_000);
    }
}
