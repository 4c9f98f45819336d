//! Pull-based generators
//!
//! A `Generator<T>` wraps a suspendable frame that hands values out through
//! a `Yielder<T>`. Each `next()` polls the frame on the calling thread until
//! it yields one value or finishes.
//!
//! ```rust,ignore
//! let squares = Generator::new(|co| async move {
//!     for i in 1..=3 {
//!         co.yield_value(i * i).await;
//!     }
//! });
//! assert_eq!(squares.collect::<Vec<_>>(), [1, 4, 9]);
//! ```
//!
//! The frame may only suspend at `yield_value`; awaiting anything else
//! (a pool `schedule()`, I/O) aborts. A panic in the body unwinds out of
//! `next()`.

use std::cell::Cell;
use std::future::Future;
use std::iter::FusedIterator;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use weft_core::fatal;

type GenFrame = Pin<Box<dyn Future<Output = ()>>>;

struct NoopWake;

impl Wake for NoopWake {
    fn wake(self: Arc<Self>) {}
}

/// Lazily produces the values its body yields
pub struct Generator<T> {
    frame: Option<GenFrame>,
    slot: Rc<Cell<Option<T>>>,
    waker: Waker,
}

impl<T: 'static> Generator<T> {
    /// Build a generator from `body`. Nothing runs until the first `next()`.
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Yielder<T>) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        let slot = Rc::new(Cell::new(None));
        let yielder = Yielder {
            slot: Rc::clone(&slot),
        };

        Self {
            frame: Some(Box::pin(body(yielder))),
            slot,
            waker: Waker::from(Arc::new(NoopWake)),
        }
    }

    /// True once the body has returned
    #[inline]
    pub fn is_done(&self) -> bool {
        self.frame.is_none()
    }
}

impl<T: 'static> Iterator for Generator<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let frame = self.frame.as_mut()?;
        let mut cx = Context::from_waker(&self.waker);

        match frame.as_mut().poll(&mut cx) {
            Poll::Ready(()) => {
                self.frame = None;
                None
            }
            Poll::Pending => match self.slot.take() {
                Some(value) => Some(value),
                None => fatal!("generator suspended without yielding a value"),
            },
        }
    }
}

impl<T: 'static> FusedIterator for Generator<T> {}

impl<T> std::fmt::Debug for Generator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("done", &self.frame.is_none())
            .finish()
    }
}

/// Handed to a generator body; its only job is `yield_value`
pub struct Yielder<T> {
    slot: Rc<Cell<Option<T>>>,
}

impl<T> Yielder<T> {
    /// Hand `value` to the consumer and suspend until the next `next()`
    pub fn yield_value(&self, value: T) -> YieldValue<'_, T> {
        YieldValue {
            slot: &self.slot,
            value: Some(value),
        }
    }
}

/// Future returned by `Yielder::yield_value`
#[must_use = "a value is only yielded when awaited"]
pub struct YieldValue<'a, T> {
    slot: &'a Cell<Option<T>>,
    value: Option<T>,
}

// `value` is never pinned; it is moved out on the first poll
impl<T> Unpin for YieldValue<'_, T> {}

impl<T> Future for YieldValue<'_, T> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        match self.value.take() {
            Some(value) => {
                self.slot.set(Some(value));
                Poll::Pending
            }
            None => Poll::Ready(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints() -> Generator<i32> {
        Generator::new(|co| async move {
            co.yield_value(1).await;
            co.yield_value(2).await;
            co.yield_value(3).await;
        })
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Pair {
        a: usize,
        b: usize,
    }

    fn pairs() -> Generator<Pair> {
        Generator::new(|co| async move {
            co.yield_value(Pair { a: 1, b: 2 }).await;
            co.yield_value(Pair { a: 3, b: 4 }).await;
            co.yield_value(Pair { a: 5, b: 6 }).await;
        })
    }

    #[test]
    fn test_yields_ints_in_order() {
        let mut ints_seen = Vec::new();
        for i in ints() {
            ints_seen.push(i);
        }
        assert_eq!(ints_seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_yields_pairs() {
        let got: Vec<Pair> = pairs().collect();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0], Pair { a: 1, b: 2 });
        assert_eq!(got[1], Pair { a: 3, b: 4 });
        assert_eq!(got[2], Pair { a: 5, b: 6 });
    }

    #[test]
    fn test_lazy_and_fused() {
        let started = Rc::new(Cell::new(false));
        let started2 = Rc::clone(&started);
        let mut numbers = Generator::new(move |co| async move {
            started2.set(true);
            co.yield_value("only").await;
        });

        assert!(!started.get());
        assert_eq!(numbers.next(), Some("only"));
        assert!(started.get());
        assert!(!numbers.is_done());

        assert_eq!(numbers.next(), None);
        assert!(numbers.is_done());
        assert_eq!(numbers.next(), None);
    }

    #[test]
    fn test_early_drop_releases_frame() {
        let held = Rc::new(());
        let held2 = Rc::clone(&held);
        let mut numbers = Generator::new(move |co| async move {
            let _keep = held2;
            for i in 0.. {
                co.yield_value(i).await;
            }
        });

        assert_eq!(numbers.by_ref().take(3).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(Rc::strong_count(&held), 2);
        drop(numbers);
        assert_eq!(Rc::strong_count(&held), 1);
    }

    #[test]
    #[should_panic(expected = "bad generator")]
    fn test_panic_reaches_consumer() {
        let mut numbers: Generator<u8> = Generator::new(|co| async move {
            co.yield_value(1).await;
            panic!("bad generator");
        });
        assert_eq!(numbers.next(), Some(1));
        numbers.next();
    }
}
