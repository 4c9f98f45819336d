//! In-flight operation state and handles
//!
//! Every submitted SQE carries a strong reference to its `OpState` as
//! `user_data` (`Arc::into_raw`). The reference is reclaimed when the CQE is
//! consumed, so the buffer the kernel writes into stays alive even if the
//! `IoOperation` handle is dropped first.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use weft_core::{OneShotEvent, SpinLock};

pub(crate) struct OpState {
    event: OneShotEvent,
    /// CQE result: byte count, or negated errno
    result: AtomicI32,
    buffer: SpinLock<Option<Vec<u8>>>,
    waker: SpinLock<Option<Waker>>,
}

impl OpState {
    pub(crate) fn new(buffer: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            event: OneShotEvent::new(),
            result: AtomicI32::new(0),
            buffer: SpinLock::new(Some(buffer)),
            waker: SpinLock::new(None),
        })
    }

    /// Leak one strong reference as SQE `user_data`
    pub(crate) fn into_user_data(self: &Arc<Self>) -> u64 {
        Arc::into_raw(Arc::clone(self)) as u64
    }

    /// Reclaim the reference leaked by `into_user_data`.
    ///
    /// # Safety
    ///
    /// `user_data` must come from `into_user_data` and be reclaimed once.
    pub(crate) unsafe fn from_user_data(user_data: u64) -> Arc<Self> {
        Arc::from_raw(user_data as *const OpState)
    }

    /// Record the CQE result, set the event and wake the awaiter.
    /// Called exactly once per operation, without the ring lock held.
    pub(crate) fn complete(&self, result: i32) {
        self.result.store(result, Ordering::Relaxed);
        self.event.set();
        if let Some(waker) = self.waker.with_lock(|w| w.take()) {
            waker.wake();
        }
    }

    fn outcome(&self) -> io::Result<usize> {
        let res = self.result.load(Ordering::Relaxed);
        if res < 0 {
            Err(io::Error::from_raw_os_error(-res))
        } else {
            Ok(res as usize)
        }
    }
}

/// Handle to one submitted read or write.
///
/// The operation is not sent to the kernel until the service is flushed.
/// Awaiting the handle yields the result together with the buffer.
#[must_use = "the buffer is only returned through the operation handle"]
pub struct IoOperation {
    state: Arc<OpState>,
}

impl IoOperation {
    pub(crate) fn new(state: Arc<OpState>) -> Self {
        Self { state }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.state.event.is_set()
    }

    /// Block the calling thread until the completion has been processed
    /// (by `process_events()` or the poll thread)
    pub fn wait(&self) {
        self.state.event.wait();
    }

    /// Bytes transferred or the OS error; `None` while in flight
    pub fn result(&self) -> Option<io::Result<usize>> {
        self.is_complete().then(|| self.state.outcome())
    }

    /// Wait for completion and take the buffer back
    pub fn into_buffer(self) -> Vec<u8> {
        self.wait();
        self.state
            .buffer
            .with_lock(|b| b.take())
            .unwrap_or_default()
    }
}

impl Future for IoOperation {
    type Output = (io::Result<usize>, Vec<u8>);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let state = &self.state;
        if !state.event.is_set() {
            state.waker.with_lock(|w| {
                let stale = match w {
                    Some(current) => !current.will_wake(cx.waker()),
                    None => true,
                };
                if stale {
                    *w = Some(cx.waker().clone());
                }
            });
            // Completion may have raced the registration
            if !state.event.is_set() {
                return Poll::Pending;
            }
        }

        let buffer = state.buffer.with_lock(|b| b.take()).unwrap_or_default();
        Poll::Ready((state.outcome(), buffer))
    }
}

impl std::fmt::Debug for IoOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoOperation")
            .field("complete", &self.is_complete())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_user_data_roundtrip_keeps_state_alive() {
        let state = OpState::new(vec![0u8; 8]);
        let ud = state.into_user_data();
        assert_eq!(Arc::strong_count(&state), 2);

        let op = IoOperation::new(Arc::clone(&state));
        drop(state);

        let reclaimed = unsafe { OpState::from_user_data(ud) };
        reclaimed.complete(8);
        drop(reclaimed);

        assert!(op.is_complete());
        assert_eq!(op.result().unwrap().unwrap(), 8);
        assert_eq!(op.into_buffer().len(), 8);
    }

    #[test]
    fn test_negative_result_is_os_error() {
        let state = OpState::new(Vec::new());
        let op = IoOperation::new(Arc::clone(&state));
        assert!(op.result().is_none());

        state.complete(-libc::EBADF);
        let err = op.result().unwrap().unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn test_wait_cross_thread() {
        let state = OpState::new(vec![1, 2, 3]);
        let op = IoOperation::new(Arc::clone(&state));

        let completer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            state.complete(3);
        });

        op.wait();
        completer.join().unwrap();
        assert_eq!(op.into_buffer(), vec![1, 2, 3]);
    }
}
