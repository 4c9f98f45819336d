//! Thread pool scheduler
//!
//! A fixed set of workers, one FIFO of wakers each. `schedule()` parks the
//! calling task on a worker chosen round-robin; there is no stealing and no
//! priority. Dropping the pool cancels every worker without draining.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use weft_core::{kinfo, ktrace, CancellationToken, ThreadSafeQueue};

use crate::config::PoolConfig;
use crate::error::PoolResult;
use crate::worker::Worker;

/// State shared by the pool, its workers and every `PoolHandle`
pub(crate) struct PoolShared {
    queues: Box<[ThreadSafeQueue<Waker>]>,
    next: AtomicUsize,
    token: CancellationToken,
}

impl PoolShared {
    #[inline]
    pub(crate) fn queue(&self, id: usize) -> &ThreadSafeQueue<Waker> {
        &self.queues[id]
    }

    #[inline]
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    fn enqueue(&self, waker: Waker) {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.queues.len();
        ktrace!("scheduling onto worker {}", idx);
        self.queues[idx].push(waker);
    }
}

pub struct ThreadPool {
    handle: PoolHandle,
    workers: Vec<Worker>,
}

impl ThreadPool {
    /// Pool with exactly `num_threads` workers
    pub fn new(num_threads: usize) -> PoolResult<Self> {
        Self::with_config(PoolConfig::from_env().num_threads(num_threads))
    }

    /// Pool configured from `WEFT_*` environment variables; one worker per
    /// available CPU unless overridden
    pub fn from_env() -> PoolResult<Self> {
        Self::with_config(PoolConfig::from_env())
    }

    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;

        let shared = Arc::new(PoolShared {
            queues: (0..config.num_threads).map(|_| ThreadSafeQueue::new()).collect(),
            next: AtomicUsize::new(0),
            token: CancellationToken::new(),
        });

        let mut pool = ThreadPool {
            handle: PoolHandle {
                shared: Arc::clone(&shared),
            },
            workers: Vec::with_capacity(config.num_threads),
        };

        for id in 0..config.num_threads {
            // On failure `pool` drops here and stops the workers spawned so far
            let worker = Worker::spawn(id, Arc::clone(&shared), &config)?;
            pool.workers.push(worker);
        }

        kinfo!(
            "thread pool started: {} workers ({})",
            config.num_threads,
            config.thread_name
        );
        Ok(pool)
    }

    #[inline]
    pub fn num_threads(&self) -> usize {
        self.handle.num_threads()
    }

    /// Suspend the awaiting task and resume it on a pool worker
    #[inline]
    pub fn schedule(&self) -> Schedule<'_> {
        self.handle.schedule()
    }

    /// Cloneable reference for tasks that need to reach the pool
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Releases every worker blocked in its queue wait
        self.handle.shared.token.cancel();
        for worker in &mut self.workers {
            worker.join();
        }
        kinfo!("thread pool stopped");
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("num_threads", &self.num_threads())
            .finish()
    }
}

/// Shared handle to a `ThreadPool`.
///
/// Keeps the queues alive but not the workers: after the pool is dropped,
/// tasks scheduled through a handle are never resumed.
#[derive(Clone)]
pub struct PoolHandle {
    shared: Arc<PoolShared>,
}

impl PoolHandle {
    #[inline]
    pub fn num_threads(&self) -> usize {
        self.shared.queues.len()
    }

    #[inline]
    pub fn schedule(&self) -> Schedule<'_> {
        Schedule {
            shared: &self.shared,
            enqueued: false,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.token.is_cancelled()
    }
}

impl std::fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolHandle")
            .field("num_threads", &self.num_threads())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

/// Future returned by `schedule()`.
///
/// The first poll hands the waker to a worker queue and suspends; the
/// worker's wake polls it again and it completes.
#[must_use = "futures do nothing unless awaited"]
pub struct Schedule<'a> {
    shared: &'a PoolShared,
    enqueued: bool,
}

impl Future for Schedule<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.enqueued {
            return Poll::Ready(());
        }
        self.enqueued = true;
        self.shared.enqueue(cx.waker().clone());
        Poll::Pending
    }
}
