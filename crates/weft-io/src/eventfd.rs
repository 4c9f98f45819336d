//! Owned eventfd
//!
//! Registered with the ring so the kernel bumps the counter on every
//! completion, and with epoll so the poll thread wakes on it. `notify()`
//! lets userspace poke the poll thread too (used at shutdown).

use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use nix::errno::Errno;

use crate::error::{IoError, IoResult};

pub(crate) struct EventFd {
    fd: OwnedFd,
}

impl EventFd {
    pub(crate) fn create() -> IoResult<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(IoError::EventFd(Errno::last() as i32));
        }
        // Safety: freshly created descriptor owned by nobody else
        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    /// Add one to the counter. A saturated counter already means "wake".
    pub(crate) fn notify(&self) {
        let val: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                &val as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 && Errno::last() != Errno::EAGAIN {
            weft_core::kwarn!("eventfd notify failed: {}", Errno::last());
        }
    }

    /// Reset the counter, returning its value (0 if it was already clear)
    pub(crate) fn drain(&self) -> u64 {
        let mut val: u64 = 0;
        let ret = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                &mut val as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            0
        } else {
            val
        }
    }
}

impl AsFd for EventFd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for EventFd {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_coalesces() {
        let efd = EventFd::create().unwrap();
        assert_eq!(efd.drain(), 0);

        efd.notify();
        efd.notify();
        efd.notify();
        assert_eq!(efd.drain(), 3);
        assert_eq!(efd.drain(), 0);
    }
}
