//! I/O service error types

use core::fmt;

/// Setup and submission failures. Errno values are carried raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoError {
    /// io_uring_setup failed
    RingSetup(i32),
    /// IORING_REGISTER_EVENTFD failed
    RegisterEventFd(i32),
    /// eventfd creation failed
    EventFd(i32),
    /// epoll creation or registration failed
    Epoll(i32),
    /// io_uring_enter failed
    Submit(i32),
    /// The poll thread could not be spawned
    Spawn(String),
}

impl IoError {
    /// The errno behind this error, if any
    pub fn errno(&self) -> Option<i32> {
        match self {
            IoError::RingSetup(e)
            | IoError::RegisterEventFd(e)
            | IoError::EventFd(e)
            | IoError::Epoll(e)
            | IoError::Submit(e) => Some(*e),
            IoError::Spawn(_) => None,
        }
    }

    pub(crate) fn errno_of(err: &std::io::Error) -> i32 {
        err.raw_os_error().unwrap_or(-1)
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::RingSetup(e) => write!(f, "io_uring setup failed (errno {})", e),
            IoError::RegisterEventFd(e) => write!(f, "eventfd registration failed (errno {})", e),
            IoError::EventFd(e) => write!(f, "eventfd creation failed (errno {})", e),
            IoError::Epoll(e) => write!(f, "epoll setup failed (errno {})", e),
            IoError::Submit(e) => write!(f, "io_uring submit failed (errno {})", e),
            IoError::Spawn(msg) => write!(f, "failed to spawn poll thread: {}", msg),
        }
    }
}

impl std::error::Error for IoError {}

pub type IoResult<T> = Result<T, IoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno() {
        assert_eq!(IoError::RingSetup(38).errno(), Some(38));
        assert_eq!(IoError::Spawn("x".into()).errno(), None);
        assert_eq!(
            IoError::Submit(4).to_string(),
            "io_uring submit failed (errno 4)"
        );
    }
}
