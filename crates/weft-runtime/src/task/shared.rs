//! Shared task state
//!
//! A `TaskCore` is owned by its `Task` handle (and, while a resume is in
//! progress, by the resuming thread). Its waker only holds a `Weak`
//! reference, so dropping the `Task` frees the frame even if wakers for it
//! are still sitting in a queue.
//!
//! Resumption is serialized by a spin lock around the frame, so a task runs
//! on at most one thread at a time.
//!
//! Continuations are not woken from inside the completing poll. The
//! outermost `resume` on a thread collects them and wakes them one after
//! another once its own frame is released, so a chain of N awaiting tasks
//! unwinds in a loop instead of N nested stack frames.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Wake, Waker};

use weft_core::{fatal, ktrace, SpinLock};

use super::TaskState;
use crate::error::TaskError;

const NO_OWNER: u64 = 0;

/// Process-unique, nonzero id of the calling thread
fn thread_token() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    thread_local! {
        static TOKEN: u64 = NEXT.fetch_add(1, Ordering::Relaxed);
    }
    TOKEN.with(|t| *t)
}

thread_local! {
    /// Set while some `resume` on this thread is running
    static IN_RESUME: Cell<bool> = const { Cell::new(false) };
    /// Continuations of tasks completed under that resume
    static DEFERRED: RefCell<VecDeque<Waker>> = const { RefCell::new(VecDeque::new()) };
}

/// Held by the outermost `resume` on a thread
struct Trampoline;

impl Trampoline {
    /// `None` when a resume is already running on this thread
    fn enter() -> Option<Self> {
        let nested = IN_RESUME.with(|flag| flag.replace(true));
        (!nested).then_some(Trampoline)
    }

    /// Wake deferred continuations until none are left. Completions they
    /// cause are deferred again and picked up by this loop.
    fn drain(self) {
        while let Some(waker) = DEFERRED.with(|q| q.borrow_mut().pop_front()) {
            waker.wake();
        }
    }
}

impl Drop for Trampoline {
    fn drop(&mut self) {
        IN_RESUME.with(|flag| flag.set(false));
    }
}

/// Queue `waker` for the running trampoline, or wake it now if there is none
fn wake_continuation(waker: Waker) {
    if IN_RESUME.with(|flag| flag.get()) {
        DEFERRED.with(|q| q.borrow_mut().push_back(waker));
    } else {
        waker.wake();
    }
}

pub(crate) type Frame<T> = Pin<Box<dyn Future<Output = Result<T, TaskError>> + Send>>;

/// Result slot of a task
pub(crate) enum Outcome<T> {
    Empty,
    Value(T),
    Failure(TaskError),
}

impl<T> Outcome<T> {
    fn take(&mut self) -> Result<T, TaskError> {
        match mem::replace(self, Outcome::Empty) {
            Outcome::Value(v) => Ok(v),
            Outcome::Failure(e) => Err(e),
            Outcome::Empty => fatal!("task outcome taken twice or before completion"),
        }
    }
}

struct Completion<T> {
    outcome: Outcome<T>,
    /// Woken exactly once, when the outcome is stored
    continuation: Option<Waker>,
}

pub(crate) struct TaskCore<T> {
    state: AtomicU8,
    started: AtomicBool,
    /// Thread currently polling the frame
    owner: AtomicU64,
    /// Set by a wake issued from inside the frame's own poll
    notified: AtomicBool,
    frame: SpinLock<Option<Frame<T>>>,
    completion: SpinLock<Completion<T>>,
    /// Resumes this task; handed to everything the frame awaits
    waker: Waker,
}

struct TaskWaker<T> {
    core: Weak<TaskCore<T>>,
}

impl<T: Send + 'static> Wake for TaskWaker<T> {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        match self.core.upgrade() {
            Some(core) => core.resume(),
            None => ktrace!("wake for dropped task ignored"),
        }
    }
}

impl<T: Send + 'static> TaskCore<T> {
    pub(crate) fn new(frame: Frame<T>) -> Arc<Self> {
        Arc::new_cyclic(|weak| TaskCore {
            state: AtomicU8::new(TaskState::Created as u8),
            started: AtomicBool::new(false),
            owner: AtomicU64::new(NO_OWNER),
            notified: AtomicBool::new(false),
            frame: SpinLock::new(Some(frame)),
            completion: SpinLock::new(Completion {
                outcome: Outcome::Empty,
                continuation: None,
            }),
            waker: Waker::from(Arc::new(TaskWaker { core: weak.clone() })),
        })
    }

    #[inline]
    pub(crate) fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    fn set_state(&self, state: TaskState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Register `waker` as the continuation, starting the task inline if
    /// nobody has started it yet. `Ready` means the outcome is available.
    pub(crate) fn poll_join(&self, waker: &Waker) -> Poll<()> {
        if !self.started.swap(true, Ordering::AcqRel) {
            self.resume();
        }

        let mut completion = self.completion.lock();
        if self.state() == TaskState::Completed {
            return Poll::Ready(());
        }
        let stale = match &completion.continuation {
            Some(current) => !current.will_wake(waker),
            None => true,
        };
        if stale {
            completion.continuation = Some(waker.clone());
        }
        Poll::Pending
    }

    pub(crate) fn take_result(&self) -> Result<T, TaskError> {
        self.completion.with_lock(|c| c.outcome.take())
    }

    /// Poll the frame on the calling thread.
    ///
    /// A wake from another thread waits for the current poll to release the
    /// frame, then polls itself; that is what lets `schedule()` move a task
    /// onto a worker. A wake from inside the task's own poll is recorded and
    /// the frame is polled again once that poll returns.
    fn resume(&self) {
        let me = thread_token();
        if self.owner.load(Ordering::Acquire) == me {
            self.notified.store(true, Ordering::Relaxed);
            return;
        }

        let trampoline = Trampoline::enter();
        self.run_frame(me);
        if let Some(trampoline) = trampoline {
            trampoline.drain();
        }
    }

    fn run_frame(&self, me: u64) {
        let mut frame = self.frame.lock();
        self.owner.store(me, Ordering::Release);

        loop {
            let Some(fut) = frame.as_mut() else {
                self.owner.store(NO_OWNER, Ordering::Release);
                ktrace!("wake for completed task ignored");
                return;
            };

            self.set_state(TaskState::Running);
            self.notified.store(false, Ordering::Relaxed);
            let mut cx = Context::from_waker(&self.waker);
            let polled = panic::catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(&mut cx)));

            let outcome = match polled {
                Ok(Poll::Pending) => {
                    if self.notified.swap(false, Ordering::Relaxed) {
                        continue;
                    }
                    self.set_state(TaskState::Suspended);
                    self.owner.store(NO_OWNER, Ordering::Release);
                    return;
                }
                Ok(Poll::Ready(Ok(value))) => Outcome::Value(value),
                Ok(Poll::Ready(Err(err))) => Outcome::Failure(err),
                Err(payload) => Outcome::Failure(TaskError::from_panic(payload)),
            };

            *frame = None;
            self.owner.store(NO_OWNER, Ordering::Release);
            drop(frame);
            self.complete(outcome);
            return;
        }
    }

    fn complete(&self, outcome: Outcome<T>) {
        let continuation = self.completion.with_lock(|c| {
            c.outcome = outcome;
            self.set_state(TaskState::Completed);
            c.continuation.take()
        });

        if let Some(waker) = continuation {
            wake_continuation(waker);
        }
    }
}
