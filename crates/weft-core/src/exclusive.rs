//! A value bundled with the lock that guards it
//!
//! `Exclusive<V, L>` is the only way the runtime shares mutable state between
//! threads. Access goes through `with_lock` or an RAII guard; both release
//! the lock on every exit path, including unwinding.

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::lock::{RawLock, RawMutex, RawSpinLock};

/// Value guarded by a spin lock. For very short critical sections only.
pub type SpinLock<T> = Exclusive<T, RawSpinLock>;

/// Value guarded by the futex mutex.
pub type Mutex<T> = Exclusive<T, RawMutex>;

pub struct Exclusive<V, L: RawLock = RawMutex> {
    lock: L,
    value: UnsafeCell<V>,
}

// Safety: the lock serializes all access to the value
unsafe impl<V: Send, L: RawLock> Send for Exclusive<V, L> {}
unsafe impl<V: Send, L: RawLock> Sync for Exclusive<V, L> {}

impl<V, L: RawLock> Exclusive<V, L> {
    #[inline]
    pub const fn new(value: V) -> Self {
        Exclusive {
            lock: L::INIT,
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock, blocking (or spinning) until it's available
    #[inline]
    pub fn lock(&self) -> ExclusiveGuard<'_, V, L> {
        self.lock.lock();
        ExclusiveGuard { owner: self }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<ExclusiveGuard<'_, V, L>> {
        if self.lock.try_lock() {
            Some(ExclusiveGuard { owner: self })
        } else {
            None
        }
    }

    /// Run `f` with exclusive access and return its result
    #[inline]
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut V) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Mutable access without locking; `&mut self` proves exclusivity
    #[inline]
    pub fn get_mut(&mut self) -> &mut V {
        self.value.get_mut()
    }

    #[inline]
    pub fn into_inner(self) -> V {
        self.value.into_inner()
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }
}

impl<V: Default, L: RawLock> Default for Exclusive<V, L> {
    fn default() -> Self {
        Exclusive::new(V::default())
    }
}

impl<V: fmt::Debug, L: RawLock> fmt::Debug for Exclusive<V, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => f.debug_struct("Exclusive").field("value", &*guard).finish(),
            None => f.debug_struct("Exclusive").field("value", &"<locked>").finish(),
        }
    }
}

/// Releases the lock when dropped
pub struct ExclusiveGuard<'a, V, L: RawLock = RawMutex> {
    owner: &'a Exclusive<V, L>,
}

impl<V, L: RawLock> Deref for ExclusiveGuard<'_, V, L> {
    type Target = V;

    #[inline]
    fn deref(&self) -> &V {
        // Safety: We hold the lock
        unsafe { &*self.owner.value.get() }
    }
}

impl<V, L: RawLock> DerefMut for ExclusiveGuard<'_, V, L> {
    #[inline]
    fn deref_mut(&mut self) -> &mut V {
        // Safety: We hold the lock
        unsafe { &mut *self.owner.value.get() }
    }
}

impl<V, L: RawLock> Drop for ExclusiveGuard<'_, V, L> {
    #[inline]
    fn drop(&mut self) {
        // Safety: the guard exists only while the lock is held
        unsafe { self.owner.lock.unlock() }
    }
}
