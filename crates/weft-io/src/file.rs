//! Positional file I/O through an `IoService`

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::path::Path;

use crate::op::IoOperation;
use crate::service::IoHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    /// Create if missing, truncate otherwise
    Write,
    /// Create if missing, keep contents
    ReadWrite,
}

/// A file whose reads and writes go through the ring.
///
/// Operations are queued like any other `IoService` request and need a
/// `flush()` before the kernel sees them.
#[derive(Debug)]
pub struct File {
    io: IoHandle,
    file: std::fs::File,
}

impl File {
    pub fn open(io: &IoHandle, path: impl AsRef<Path>, mode: Mode) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        match mode {
            Mode::Read => options.read(true),
            Mode::Write => options.write(true).create(true).truncate(true),
            Mode::ReadWrite => options.read(true).write(true).create(true),
        };

        Ok(Self {
            io: io.clone(),
            file: options.open(path)?,
        })
    }

    /// Read `buf.len()` bytes starting at `offset`
    pub fn read_at(&self, buf: Vec<u8>, offset: u64) -> IoOperation {
        self.io.read(self.fd(), buf, offset)
    }

    pub fn write_at(&self, buf: Vec<u8>, offset: u64) -> IoOperation {
        self.io.write(self.fd(), buf, offset)
    }

    #[inline]
    pub fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    /// Blocking size query, for sizing reads
    pub fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}
