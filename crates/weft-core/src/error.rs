//! Error types shared by the primitives

use core::fmt;

/// Returned by a push into a full `LockFreeDeque`; gives the value back.
#[derive(Clone, PartialEq, Eq)]
pub struct PushError<T>(pub T);

impl<T> PushError<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PushError(..)")
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deque full")
    }
}

impl<T> std::error::Error for PushError<T> {}

/// A cooperative cancellation was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation cancelled")
    }
}

impl std::error::Error for Cancelled {}
