//! Condvar-based futex emulation
//!
//! Used on platforms without a futex syscall. The word is compared under the
//! internal mutex and wakers take the same mutex before notifying, so a
//! store-then-wake can never slip between a waiter's check and its sleep.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

pub(super) struct Parker {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl Parker {
    pub(super) const fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    pub(super) fn wait(&self, word: &AtomicU32, expected: u32, timeout: Option<Duration>) -> bool {
        let guard = self.mutex.lock().unwrap_or_else(|e| e.into_inner());

        if word.load(Ordering::Acquire) != expected {
            return true;
        }

        match timeout {
            Some(t) => {
                let (_guard, result) = self
                    .condvar
                    .wait_timeout(guard, t)
                    .unwrap_or_else(|e| e.into_inner());
                !result.timed_out()
            }
            None => {
                let _guard = self.condvar.wait(guard).unwrap_or_else(|e| e.into_inner());
                true
            }
        }
    }

    pub(super) fn wake(&self, _word: &AtomicU32, count: i32) {
        drop(self.mutex.lock().unwrap_or_else(|e| e.into_inner()));
        if count == 1 {
            self.condvar.notify_one();
        } else {
            self.condvar.notify_all();
        }
    }
}
