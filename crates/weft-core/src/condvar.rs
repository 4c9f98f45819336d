//! Predicate waits over an `Exclusive` value
//!
//! `ConditionVariable<V>` pairs a mutex-guarded value with a futex sequence
//! word. Notifiers bump the sequence and wake; waiters sample the sequence
//! while still holding the lock, release it, then sleep only while the
//! sequence is unchanged. A notify issued between the predicate check and the
//! sleep therefore changes the word and the sleep returns at once.
//!
//! Token-aware waits register the sequence futex with the token, so
//! cancelling it wakes them the same way a notify would.

use core::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crate::cancel::CancellationToken;
use crate::exclusive::{Exclusive, ExclusiveGuard};
use crate::futex::Futex;
use crate::lock::RawMutex;

pub struct ConditionVariable<V> {
    inner: Exclusive<V, RawMutex>,
    seq: Futex,
}

impl<V> ConditionVariable<V> {
    pub const fn new(value: V) -> Self {
        Self {
            inner: Exclusive::new(value),
            seq: Futex::new(0),
        }
    }

    /// Run `f` under the lock. Does not notify.
    #[inline]
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut V) -> R) -> R {
        self.inner.with_lock(f)
    }

    #[inline]
    pub fn lock(&self) -> ExclusiveGuard<'_, V, RawMutex> {
        self.inner.lock()
    }

    pub fn notify_one(&self) {
        self.seq.value().fetch_add(1, Ordering::Release);
        self.seq.wake_one();
    }

    pub fn notify_all(&self) {
        self.seq.value().fetch_add(1, Ordering::Release);
        self.seq.wake_all();
    }

    /// Block until `pred` holds. `pred` runs under the lock.
    pub fn wait(&self, mut pred: impl FnMut(&V) -> bool) {
        self.wait_inner(&mut pred, None, None);
    }

    /// Block until `pred` holds or `token` is cancelled.
    ///
    /// Returns the final predicate value; `false` means cancelled.
    pub fn wait_with_token(
        &self,
        mut pred: impl FnMut(&V) -> bool,
        token: &CancellationToken,
    ) -> bool {
        self.wait_inner(&mut pred, Some(token), None)
    }

    /// Block until `pred` holds or `timeout` elapses.
    ///
    /// Returns the final predicate value; `false` means timed out.
    pub fn wait_timeout(&self, mut pred: impl FnMut(&V) -> bool, timeout: Duration) -> bool {
        self.wait_inner(&mut pred, None, Some(Instant::now() + timeout))
    }

    fn wait_inner(
        &self,
        pred: &mut dyn FnMut(&V) -> bool,
        token: Option<&CancellationToken>,
        deadline: Option<Instant>,
    ) -> bool {
        let _registration = token.map(|t| t.register(&self.seq));

        loop {
            let seq = {
                let guard = self.inner.lock();
                if pred(&guard) {
                    return true;
                }
                // Sampled under the lock: any later notify changes it. Read
                // before the token so a cancel racing this check bumps it.
                let seq = self.seq.value().load(Ordering::Acquire);
                if token.is_some_and(|t| t.is_cancelled()) {
                    return false;
                }
                seq
            };

            let remaining = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        return self.inner.with_lock(|v| pred(v));
                    }
                    Some(d - now)
                }
                None => None,
            };

            self.seq.wait(seq, remaining);
        }
    }
}

impl<V: Default> Default for ConditionVariable<V> {
    fn default() -> Self {
        Self::new(V::default())
    }
}
