//! Unbounded blocking FIFO
//!
//! Each worker owns one of these, filled with wakers by `schedule()`.
//! `wait()` only blocks until the queue is non-empty; consumers then `pop()`,
//! so a racing consumer may leave them with `None`.

use std::collections::VecDeque;

use crate::cancel::CancellationToken;
use crate::condvar::ConditionVariable;

pub struct ThreadSafeQueue<T> {
    items: ConditionVariable<VecDeque<T>>,
}

impl<T> ThreadSafeQueue<T> {
    pub fn new() -> Self {
        Self {
            items: ConditionVariable::new(VecDeque::new()),
        }
    }

    /// Append at the back and wake one waiter
    pub fn push(&self, value: T) {
        self.items.with_lock(|q| q.push_back(value));
        self.items.notify_one();
    }

    /// Remove the front element, if any. Never blocks on emptiness.
    pub fn pop(&self) -> Option<T> {
        self.items.with_lock(|q| q.pop_front())
    }

    /// Remove and return the first element matching `pred`.
    ///
    /// Other elements keep their relative order.
    pub fn find_if(&self, mut pred: impl FnMut(&T) -> bool) -> Option<T> {
        self.items.with_lock(|q| {
            let idx = q.iter().position(|v| pred(v))?;
            q.remove(idx)
        })
    }

    /// Block until the queue is non-empty or `token` is cancelled.
    ///
    /// Consumes nothing.
    pub fn wait(&self, token: &CancellationToken) {
        self.items.wait_with_token(|q| !q.is_empty(), token);
    }

    /// Wake every thread blocked in `wait()`
    pub fn notify_all(&self) {
        self.items.notify_all();
    }

    /// Snapshot; may be stale by the time the caller acts on it
    pub fn is_empty(&self) -> bool {
        self.items.with_lock(|q| q.is_empty())
    }

    /// Snapshot; may be stale by the time the caller acts on it
    pub fn len(&self) -> usize {
        self.items.with_lock(|q| q.len())
    }
}

impl<T> Default for ThreadSafeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ThreadSafeQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadSafeQueue")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_single_thread() {
        let queue = ThreadSafeQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None::<i32>);

        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_find_if_removes_match() {
        let queue = ThreadSafeQueue::new();
        for i in 1..=5 {
            queue.push(i);
        }

        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.find_if(|v| *v == 4), Some(4));
        assert_eq!(queue.find_if(|v| *v == 42), None);

        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), Some(5));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_wait_wakes_on_push() {
        let queue = Arc::new(ThreadSafeQueue::new());
        let token = CancellationToken::new();

        let q2 = Arc::clone(&queue);
        let t2 = token.clone();
        let handle = thread::spawn(move || {
            q2.wait(&t2);
            q2.pop()
        });

        thread::sleep(Duration::from_millis(20));
        queue.push(7u32);
        assert_eq!(handle.join().unwrap(), Some(7));
    }

    #[test]
    fn test_wait_released_by_cancel() {
        let queue: Arc<ThreadSafeQueue<u32>> = Arc::new(ThreadSafeQueue::new());
        let token = CancellationToken::new();

        let q2 = Arc::clone(&queue);
        let t2 = token.clone();
        let handle = thread::spawn(move || q2.wait(&t2));

        thread::sleep(Duration::from_millis(20));
        token.cancel();

        let deadline = std::time::Instant::now() + Duration::from_millis(500);
        while !handle.is_finished() {
            assert!(
                std::time::Instant::now() < deadline,
                "wait() still blocked after the token was cancelled"
            );
            thread::sleep(Duration::from_millis(1));
        }
        handle.join().unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_wait_released_by_parent_cancel() {
        let queue: Arc<ThreadSafeQueue<u32>> = Arc::new(ThreadSafeQueue::new());
        let root = CancellationToken::new();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let q = Arc::clone(&queue);
                let token = root.child();
                thread::spawn(move || q.wait(&token))
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        root.cancel();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_concurrent_producers_consumers() {
        const PER_PRODUCER: usize = 1000;
        let queue = Arc::new(ThreadSafeQueue::new());
        let consumed = Arc::new(AtomicUsize::new(0));
        let sum = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for p in 0..4 {
            let queue = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    queue.push(p * PER_PRODUCER + i);
                }
            }));
        }

        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            let consumed = Arc::clone(&consumed);
            let sum = Arc::clone(&sum);
            handles.push(thread::spawn(move || {
                while consumed.load(Ordering::Acquire) < 4 * PER_PRODUCER {
                    if let Some(v) = queue.pop() {
                        sum.fetch_add(v, Ordering::Relaxed);
                        consumed.fetch_add(1, Ordering::AcqRel);
                    } else {
                        thread::yield_now();
                    }
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        let n = 4 * PER_PRODUCER;
        assert_eq!(consumed.load(Ordering::Acquire), n);
        assert_eq!(sum.load(Ordering::Acquire), n * (n - 1) / 2);
    }
}
