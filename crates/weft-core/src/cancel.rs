//! Cancellation token for cooperative cancellation
//!
//! Workers and the I/O poll thread check their token at every loop turn and
//! exit when it is cancelled. Tokens can be linked to form parent-child
//! relationships.
//!
//! Threads blocked in a token-aware wait (`ConditionVariable::wait_with_token`,
//! `ThreadSafeQueue::wait`) register their futex with the token for the
//! duration of the wait, so `cancel()` alone releases them.

use core::sync::atomic::{AtomicBool, Ordering};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::Cancelled;
use crate::exclusive::Mutex;
use crate::futex::Futex;

/// Token for checking and triggering cancellation
///
/// Clones share the same flag. Cancelling a parent is visible through every
/// child; cancelling a child leaves the parent untouched.
#[derive(Clone)]
pub struct CancellationToken {
    inner: CancellationInner,
}

#[derive(Clone)]
enum CancellationInner {
    Owned(Arc<OwnedCancellation>),
    /// Never cancels; `cancel()` is a no-op
    Never,
}

struct OwnedCancellation {
    cancelled: AtomicBool,
    parent: Option<CancellationToken>,
    /// Futexes of threads currently blocked on this token or a child
    waiters: Mutex<Vec<WaiterRef>>,
}

impl OwnedCancellation {
    fn new(parent: Option<CancellationToken>) -> Arc<Self> {
        Arc::new(OwnedCancellation {
            cancelled: AtomicBool::new(false),
            parent,
            waiters: Mutex::new(Vec::new()),
        })
    }
}

/// Futex registered by a blocked waiter
struct WaiterRef(*const Futex);

// Only dereferenced under the `waiters` lock, while the registering
// `CancelRegistration` (which borrows the futex) is alive
unsafe impl Send for WaiterRef {}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: CancellationInner::Owned(OwnedCancellation::new(None)),
        }
    }

    /// A token that can never be cancelled (no allocation)
    pub const fn never() -> Self {
        Self {
            inner: CancellationInner::Never,
        }
    }

    /// Create a child token linked to this one
    pub fn child(&self) -> Self {
        Self {
            inner: CancellationInner::Owned(OwnedCancellation::new(Some(self.clone()))),
        }
    }

    /// Check if cancellation was requested, here or on any ancestor
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        match &self.inner {
            CancellationInner::Owned(arc) => {
                if arc.cancelled.load(Ordering::Acquire) {
                    return true;
                }
                match arc.parent {
                    Some(ref parent) => parent.is_cancelled(),
                    None => false,
                }
            }
            CancellationInner::Never => false,
        }
    }

    /// Request cancellation and wake every thread blocked in a wait on this
    /// token or one of its children
    pub fn cancel(&self) {
        let CancellationInner::Owned(arc) = &self.inner else {
            return;
        };
        if arc.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        arc.waiters.with_lock(|waiters| {
            for waiter in waiters.iter() {
                // Safety: the registration borrowing this futex removes it
                // under this lock before the borrow ends
                let futex = unsafe { &*waiter.0 };
                futex.value().fetch_add(1, Ordering::Release);
                futex.wake_all();
            }
        });
    }

    /// Have `cancel()` on this token or any ancestor bump and wake `futex`
    /// until the returned guard drops.
    ///
    /// The waiter must check `is_cancelled()` after registering and before
    /// sampling the futex word it sleeps on.
    pub(crate) fn register<'a>(&'a self, futex: &'a Futex) -> CancelRegistration<'a> {
        let ptr = futex as *const Futex;
        self.for_each_node(|node| node.waiters.with_lock(|w| w.push(WaiterRef(ptr))));
        CancelRegistration {
            token: self,
            futex: ptr,
            _futex: PhantomData,
        }
    }

    fn for_each_node(&self, mut f: impl FnMut(&OwnedCancellation)) {
        let mut current = Some(self);
        while let Some(token) = current {
            match &token.inner {
                CancellationInner::Owned(arc) => {
                    f(arc);
                    current = arc.parent.as_ref();
                }
                CancellationInner::Never => break,
            }
        }
    }

    /// ```ignore
    /// loop {
    ///     token.check()?;
    ///     // ... do work ...
    /// }
    /// ```
    #[inline]
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Keeps a futex registered with a token and its ancestors
pub(crate) struct CancelRegistration<'a> {
    token: &'a CancellationToken,
    futex: *const Futex,
    _futex: PhantomData<&'a Futex>,
}

impl Drop for CancelRegistration<'_> {
    fn drop(&mut self) {
        let ptr = self.futex;
        self.token.for_each_node(|node| {
            node.waiters.with_lock(|waiters| {
                if let Some(idx) = waiters.iter().position(|w| std::ptr::eq(w.0, ptr)) {
                    waiters.swap_remove(idx);
                }
            })
        });
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cancellation() {
        let token = CancellationToken::new();

        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());

        token.cancel();

        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(Cancelled));
    }

    #[test]
    fn test_clone_shares_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_child_sees_parent() {
        let root = CancellationToken::new();
        let level1 = root.child();
        let level2 = level1.child();

        assert!(!level2.is_cancelled());
        root.cancel();
        assert!(level1.is_cancelled());
        assert!(level2.is_cancelled());
    }

    #[test]
    fn test_child_independent_cancel() {
        let parent = CancellationToken::new();
        let child = parent.child();

        // Cancelling child does NOT affect parent
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_cancel_wakes_registered_futex() {
        let futex = Futex::new(0);
        let root = CancellationToken::new();
        let child = root.child();

        {
            let _registration = child.register(&futex);
            root.cancel();
            assert_eq!(futex.value().load(Ordering::Acquire), 1);

            // Repeated cancel does not bump again
            root.cancel();
            assert_eq!(futex.value().load(Ordering::Acquire), 1);
        }

        let fresh = CancellationToken::new();
        drop(fresh.register(&futex));
        fresh.cancel();
        assert_eq!(futex.value().load(Ordering::Acquire), 1);
    }

    #[test]
    fn test_never() {
        let token = CancellationToken::never();
        token.cancel();
        assert!(!token.is_cancelled());
        assert!(!token.child().is_cancelled());
    }
}
