//! One-shot cross-thread signal
//!
//! Starts unset; `set()` is idempotent and releases every current and future
//! waiter. There is no reset. Implements `Wake`, so an `Arc<OneShotEvent>`
//! can be turned into a `Waker` and used as a task continuation.

use core::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::Wake;
use std::time::{Duration, Instant};

use crate::futex::Futex;

const UNSET: u32 = 0;
const SET: u32 = 1;

#[derive(Debug, Default)]
pub struct OneShotEvent {
    futex: Futex,
}

impl OneShotEvent {
    pub const fn new() -> Self {
        Self {
            futex: Futex::new(UNSET),
        }
    }

    pub fn set(&self) {
        if self.futex.value().swap(SET, Ordering::Release) == UNSET {
            self.futex.wake_all();
        }
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.futex.value().load(Ordering::Acquire) == SET
    }

    /// Block until `set()` has been called
    pub fn wait(&self) {
        while !self.is_set() {
            self.futex.wait(UNSET, None);
        }
    }

    /// Returns `true` if the event was set within `timeout`
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_set() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.futex.wait(UNSET, Some(deadline - now));
        }
        true
    }
}

impl Wake for OneShotEvent {
    fn wake(self: Arc<Self>) {
        self.set();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.set();
    }
}
