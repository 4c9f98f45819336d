//! io_uring wrapper
//!
//! Owned by `IoService` behind a mutex. Every method takes `&mut self`, so
//! SQ pushes, submission and CQ draining are serialized by that lock and each
//! CQE is consumed by exactly one caller. Completions are handed back to the
//! caller so it can signal them after releasing the lock.

use std::os::fd::RawFd;
use std::sync::Arc;

use io_uring::{squeue, IoUring};
use weft_core::{fatal, ktrace};

use crate::error::{IoError, IoResult};
use crate::op::OpState;

/// A consumed CQE: the operation it belongs to and its result
pub(crate) type Completed = (Arc<OpState>, i32);

pub(crate) struct Ring {
    uring: IoUring,
    /// Pushed but not yet submitted
    pending: u32,
    /// Submitted, CQE not yet consumed
    inflight: usize,
}

impl Ring {
    pub(crate) fn new(entries: u32) -> IoResult<Self> {
        let uring = IoUring::builder()
            .build(entries)
            .map_err(|e| IoError::RingSetup(IoError::errno_of(&e)))?;

        Ok(Self {
            uring,
            pending: 0,
            inflight: 0,
        })
    }

    /// Have the kernel bump `fd` on every posted CQE
    pub(crate) fn register_eventfd(&self, fd: RawFd) -> IoResult<()> {
        self.uring
            .submitter()
            .register_eventfd(fd)
            .map_err(|e| IoError::RegisterEventFd(IoError::errno_of(&e)))
    }

    /// Queue `entry`. A full SQ is flushed and the CQ drained into
    /// `completed` once; if that still frees no slot the process aborts.
    pub(crate) fn push(&mut self, entry: squeue::Entry, completed: &mut Vec<Completed>) {
        if self.uring.submission().is_full() {
            ktrace!("submission queue full, flushing");
            if let Err(e) = self.flush() {
                fatal!("no submission slot available: {}", e);
            }
            self.drain(completed);
        }

        // Safety: the entry's buffer is owned by the OpState referenced from
        // its user_data, which outlives the operation
        let pushed = unsafe { self.uring.submission().push(&entry) };
        if pushed.is_err() {
            fatal!("no submission slot available after flush");
        }
        self.pending += 1;
    }

    /// Submit queued entries. Returns how many the kernel accepted.
    pub(crate) fn flush(&mut self) -> IoResult<usize> {
        if self.pending == 0 {
            return Ok(0);
        }
        let submitted = self
            .uring
            .submit()
            .map_err(|e| IoError::Submit(IoError::errno_of(&e)))?;
        self.inflight += submitted;
        self.pending = self.pending.saturating_sub(submitted as u32);
        Ok(submitted)
    }

    /// Consume every available CQE
    pub(crate) fn drain(&mut self, completed: &mut Vec<Completed>) -> usize {
        let mut count = 0;
        for cqe in self.uring.completion() {
            // Safety: every SQE we push carries OpState::into_user_data
            let state = unsafe { OpState::from_user_data(cqe.user_data()) };
            completed.push((state, cqe.result()));
            count += 1;
        }
        self.inflight = self.inflight.saturating_sub(count);
        count
    }

    /// Operations pushed or submitted whose completion is not consumed
    pub(crate) fn outstanding(&self) -> usize {
        self.inflight + self.pending as usize
    }
}
