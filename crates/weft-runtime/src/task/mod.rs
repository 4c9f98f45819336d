//! Suspendable tasks
//!
//! A `Task<T>` is a lazily started unit of asynchronous work producing a `T`.
//! Nothing runs until the task is awaited (or handed to `sync_wait`); the
//! first resume then happens inline on the awaiting thread. Whoever wakes a
//! suspended task resumes it on their own thread, which is how
//! `ThreadPool::schedule()` moves work onto a worker.
//!
//! ```rust,ignore
//! fn add_one(pool: PoolHandle, x: u32) -> Task<u32> {
//!     Task::new(async move {
//!         pool.schedule().await; // continues on a worker thread
//!         x + 1
//!     })
//! }
//!
//! let n = sync_wait(add_one(pool.handle(), 41))?;
//! ```

mod shared;

use std::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use weft_core::{fatal, OneShotEvent};

use crate::error::TaskError;
use self::shared::TaskCore;

/// Lifecycle of a task's frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Constructed, never resumed
    Created = 0,
    /// Being polled on some thread
    Running = 1,
    /// Waiting for a wake
    Suspended = 2,
    /// Outcome stored, frame dropped
    Completed = 3,
}

impl TaskState {
    #[inline]
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TaskState::Created,
            1 => TaskState::Running,
            2 => TaskState::Suspended,
            _ => TaskState::Completed,
        }
    }
}

/// Move-only handle to a suspendable computation.
///
/// Awaiting it yields `Ok(value)`, or `Err(TaskError)` if the computation
/// failed or panicked. A task can be awaited once; awaiting an empty or
/// consumed task aborts the process.
pub struct Task<T> {
    core: Option<Arc<TaskCore<T>>>,
}

impl<T: Send + 'static> Task<T> {
    /// Wrap an infallible computation. Does not start it.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            core: Some(TaskCore::new(Box::pin(async move { Ok(future.await) }))),
        }
    }

    /// Wrap a computation returning `Result`; `Err` becomes
    /// `TaskError::Failed`. A `TaskError` returned via `?` from an awaited
    /// child task is passed through unchanged.
    pub fn fallible<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        Self {
            core: Some(TaskCore::new(Box::pin(async move {
                future.await.map_err(|e| {
                    let err: Box<dyn Error + Send + Sync> = e.into();
                    match err.downcast::<TaskError>() {
                        Ok(inner) => *inner,
                        Err(other) => TaskError::Failed(other),
                    }
                })
            }))),
        }
    }

    /// True once the outcome is stored and not yet taken
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state() == Some(TaskState::Completed)
    }

    /// `None` for an empty or consumed task
    #[inline]
    pub fn state(&self) -> Option<TaskState> {
        self.core.as_ref().map(|core| core.state())
    }

    /// Start the task if nobody has, and block the calling thread until it
    /// completes. The outcome stays in the task for `into_result()`.
    pub fn wait_sync(&self) {
        let Some(core) = self.core.as_ref() else {
            fatal!("wait_sync on an empty or already consumed task");
        };
        if core.state() == TaskState::Completed {
            return;
        }

        let event = Arc::new(OneShotEvent::new());
        let waker = Waker::from(Arc::clone(&event));
        if core.poll_join(&waker).is_pending() {
            event.wait();
        }
    }

    /// Take the outcome of a completed task. Aborts if the task is empty
    /// or has not completed.
    pub fn into_result(mut self) -> Result<T, TaskError> {
        match self.core.take() {
            Some(core) if core.state() == TaskState::Completed => core.take_result(),
            Some(_) => fatal!("result taken from a task that has not completed"),
            None => fatal!("result taken from an empty or already consumed task"),
        }
    }
}

impl<T> Task<T> {
    /// A task with no computation. Awaiting it is fatal.
    pub const fn empty() -> Self {
        Self { core: None }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.core.is_none()
    }
}

impl<T> Default for Task<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Send + 'static> Future for Task<T> {
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = match self.core.as_ref() {
            None => fatal!("awaited an empty or already consumed task"),
            Some(core) => match core.poll_join(cx.waker()) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(()) => core.take_result(),
            },
        };
        self.core = None;
        Poll::Ready(result)
    }
}

impl<T: Send + 'static> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("state", &self.state()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::Waker;
    use std::thread;
    use std::time::Duration;

    use weft_core::{OneShotEvent, SpinLock};

    use crate::sync_wait::sync_wait;

    /// Future that suspends until `open()` is called from outside
    #[derive(Default)]
    struct Gate {
        open: std::sync::atomic::AtomicBool,
        waker: SpinLock<Option<Waker>>,
    }

    impl Gate {
        fn open(&self) {
            self.open.store(true, Ordering::Release);
            if let Some(w) = self.waker.with_lock(|w| w.take()) {
                w.wake();
            }
        }

        fn wait(self: Arc<Self>) -> GateWait {
            GateWait { gate: self }
        }
    }

    struct GateWait {
        gate: Arc<Gate>,
    }

    impl Future for GateWait {
        type Output = ();

        fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            self.gate.waker.with_lock(|w| *w = Some(cx.waker().clone()));
            if self.gate.open.load(Ordering::Acquire) {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        }
    }

    fn explode(msg: &'static str) -> u32 {
        panic!("{}", msg)
    }

    fn dummy_waker() -> Waker {
        Waker::from(Arc::new(OneShotEvent::new()))
    }

    #[derive(Debug)]
    struct Boom;

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("boom")
        }
    }

    impl Error for Boom {}

    #[test]
    fn test_lazy_start() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs2 = Arc::clone(&runs);
        let task = Task::new(async move {
            runs2.fetch_add(1, Ordering::SeqCst);
            7
        });

        assert_eq!(task.state(), Some(TaskState::Created));
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        assert_eq!(sync_wait(task).unwrap(), 7);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_completed_inline_is_ready() {
        let mut task = Task::new(async { 5u32 });
        let waker = dummy_waker();
        let mut cx = Context::from_waker(&waker);

        match Pin::new(&mut task).poll(&mut cx) {
            Poll::Ready(Ok(v)) => assert_eq!(v, 5),
            other => panic!("expected immediate completion, got {:?}", other.is_ready()),
        }
        assert!(task.is_empty());
    }

    #[test]
    fn test_failure_propagates() {
        let task: Task<u32> = Task::fallible(async { Err::<u32, _>(Boom) });
        let err = sync_wait(task).unwrap_err();
        assert!(err.downcast::<Boom>().is_ok());
    }

    #[test]
    fn test_panic_captured() {
        let task = Task::new(async { explode("kaboom") });
        match sync_wait(task) {
            Err(TaskError::Panicked(msg)) => assert_eq!(msg, "kaboom"),
            other => panic!("unexpected {:?}", other.map_err(|e| e.to_string())),
        }
    }

    #[test]
    fn test_nested_failure_passes_through() {
        let outer: Task<u32> = Task::fallible(async {
            let inner = Task::new(async { explode("deep") });
            let v = inner.await?;
            Ok::<_, TaskError>(v + 1)
        });

        let err = sync_wait(outer).unwrap_err();
        assert!(err.is_panic());
    }

    #[test]
    fn test_resumes_on_waking_thread() {
        let gate = Arc::new(Gate::default());
        let gate2 = Arc::clone(&gate);

        let task = Task::new(async move {
            gate2.wait().await;
            thread::current().id()
        });

        let opener = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                gate.open();
                thread::current().id()
            })
        };

        let resumed_on = sync_wait(task).unwrap();
        let opener_id = opener.join().unwrap();
        assert_eq!(resumed_on, opener_id);
        assert_ne!(resumed_on, thread::current().id());
    }

    #[test]
    fn test_awaiting_task_chain() {
        fn level(depth: u32) -> Task<u32> {
            Task::fallible(async move {
                if depth == 0 {
                    return Ok::<_, TaskError>(0);
                }
                Ok(level(depth - 1).await? + 1)
            })
        }

        assert_eq!(sync_wait(level(10)).unwrap(), 10);
    }

    #[test]
    fn test_drop_suspended_task() {
        let gate = Arc::new(Gate::default());
        let dropped = Arc::new(AtomicUsize::new(0));

        struct OnDrop(Arc<AtomicUsize>);
        impl Drop for OnDrop {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let gate2 = Arc::clone(&gate);
        let guard = OnDrop(Arc::clone(&dropped));
        let mut task = Task::new(async move {
            let _guard = guard;
            gate2.wait().await;
        });

        let waker = dummy_waker();
        let mut cx = Context::from_waker(&waker);
        assert!(Pin::new(&mut task).poll(&mut cx).is_pending());
        assert_eq!(task.state(), Some(TaskState::Suspended));

        drop(task);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);

        // Stale wake for a dropped task is a no-op
        gate.open();
    }

    #[test]
    fn test_stale_wake_after_completion_is_ignored() {
        let stash: Arc<SpinLock<Option<Waker>>> = Arc::new(SpinLock::new(None));
        let stash2 = Arc::clone(&stash);
        let task = Task::new(async move {
            std::future::poll_fn(|cx| {
                stash2.with_lock(|w| *w = Some(cx.waker().clone()));
                Poll::Ready(())
            })
            .await;
            9u32
        });

        task.wait_sync();
        let waker = stash.with_lock(|w| w.take()).unwrap();

        // Not a resume: the outcome is untouched
        waker.wake_by_ref();
        assert_eq!(task.state(), Some(TaskState::Completed));
        assert_eq!(task.into_result().unwrap(), 9);

        // Task gone entirely
        waker.wake();
    }

    #[test]
    fn test_wake_chain_from_outside_pool() {
        // Completions triggered by a plain thread unwind through its own
        // resume, one level at a time
        fn level(gate: Arc<Gate>, depth: u32) -> Task<u32> {
            Task::fallible(async move {
                if depth == 0 {
                    gate.wait().await;
                    return Ok::<_, TaskError>(0);
                }
                Ok(level(gate, depth - 1).await? + 1)
            })
        }

        let gate = Arc::new(Gate::default());
        let task = level(Arc::clone(&gate), 300);
        let opener = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            gate.open();
        });

        assert_eq!(sync_wait(task).unwrap(), 300);
        opener.join().unwrap();
    }

    #[test]
    fn test_empty_task() {
        let task: Task<u32> = Task::default();
        assert!(task.is_empty());
        assert!(!task.is_ready());
        assert_eq!(task.state(), None);
    }
}
