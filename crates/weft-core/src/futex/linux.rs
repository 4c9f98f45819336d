//! Linux futex syscall backend
//!
//! FUTEX_WAIT sleeps only if the word still holds the expected value, which
//! closes the check-then-sleep race without any userspace lock.

use std::sync::atomic::AtomicU32;
use std::time::Duration;

pub(super) struct Parker;

impl Parker {
    pub(super) const fn new() -> Self {
        Parker
    }

    pub(super) fn wait(&self, word: &AtomicU32, expected: u32, timeout: Option<Duration>) -> bool {
        // FUTEX_WAIT takes a relative timeout
        let timespec = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
            tv_nsec: d.subsec_nanos() as libc::c_long,
        });

        let timespec_ptr = match &timespec {
            Some(ts) => ts as *const libc::timespec,
            None => std::ptr::null(),
        };

        let result = unsafe {
            libc::syscall(
                libc::SYS_futex,
                word.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                expected,
                timespec_ptr,
                std::ptr::null::<u32>(), // uaddr2 (unused)
                0u32,                    // val3 (unused)
            )
        };

        if result == 0 {
            return true;
        }

        // EAGAIN = value already changed, EINTR = signal; only ETIMEDOUT is a timeout
        let errno = unsafe { *libc::__errno_location() };
        errno != libc::ETIMEDOUT
    }

    pub(super) fn wake(&self, word: &AtomicU32, count: i32) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                word.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                count,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}
