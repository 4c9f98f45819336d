//! Worker thread management
//!
//! Each worker is an OS thread draining its own `ThreadSafeQueue<Waker>`.
//! Waking a popped waker resumes the corresponding task on the worker.

use std::cell::Cell;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use weft_core::{kdebug, ktrace, kwarn};

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::pool::PoolShared;

thread_local! {
    static CURRENT_WORKER_ID: Cell<usize> = const { Cell::new(usize::MAX) };
}

fn set_current_worker_id(id: usize) {
    CURRENT_WORKER_ID.with(|cell| cell.set(id));
}

/// Index of the pool worker running on this thread, `None` elsewhere
#[inline]
pub fn current_worker_id() -> Option<usize> {
    let id = CURRENT_WORKER_ID.with(|cell| cell.get());
    (id != usize::MAX).then_some(id)
}

pub(crate) struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn(id: usize, shared: Arc<PoolShared>, config: &PoolConfig) -> PoolResult<Self> {
        let mut builder = thread::Builder::new().name(format!("{}-{}", config.thread_name, id));
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }

        let handle = builder
            .spawn(move || run(id, &shared))
            .map_err(|e| PoolError::SpawnFailed(e.to_string()))?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Wait for the thread to exit. The pool's token must already be
    /// cancelled.
    pub(crate) fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            // Pool dropped from one of its own tasks; the loop exits after
            // this resume returns
            kwarn!("worker {} detached: pool dropped on its own thread", self.id);
            return;
        }

        if handle.join().is_err() {
            kwarn!("worker {} exited by panic", self.id);
        }
    }
}

fn run(id: usize, shared: &PoolShared) {
    set_current_worker_id(id);
    kdebug!("worker {} started", id);

    let queue = shared.queue(id);
    let token = shared.token();

    while !token.is_cancelled() {
        queue.wait(token);
        if token.is_cancelled() {
            break;
        }
        if let Some(waker) = queue.pop() {
            ktrace!("worker {} resuming task", id);
            waker.wake();
        }
    }

    kdebug!("worker {} stopped, {} resumptions dropped", id, queue.len());
}
