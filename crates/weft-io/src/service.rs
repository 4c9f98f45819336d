//! Kernel I/O service
//!
//! Owns the ring, the eventfd registered with it and an epoll instance
//! watching that eventfd. Reads and writes are queued with `read`/`write`,
//! sent with `flush()`, and completed either by calling `process_events()`
//! or by the optional poll thread started with `enable_poll_events()`.

use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use io_uring::{opcode, squeue, types};
use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags};
use weft_core::{kdebug, kerror, kinfo, kwarn, CancellationToken, Mutex};

use crate::config::IoConfig;
use crate::error::{IoError, IoResult};
use crate::eventfd::EventFd;
use crate::op::{IoOperation, OpState};
use crate::ring::{Completed, Ring};

struct IoShared {
    ring: Mutex<Ring>,
    eventfd: EventFd,
    epoll: Epoll,
    config: IoConfig,
}

impl IoShared {
    fn submit(&self, state: &Arc<OpState>, entry: squeue::Entry) {
        let entry = entry.user_data(state.into_user_data());
        let mut completed = Vec::new();
        self.ring.with_lock(|ring| ring.push(entry, &mut completed));
        signal(completed);
    }

    fn flush(&self) -> IoResult<usize> {
        self.ring.with_lock(|ring| ring.flush())
    }

    fn process_events(&self) -> usize {
        let mut completed = Vec::new();
        let count = self.ring.with_lock(|ring| ring.drain(&mut completed));
        signal(completed);
        count
    }
}

/// Signal completions. Runs without the ring lock so continuations may
/// submit more work.
fn signal(completed: Vec<Completed>) {
    for (state, result) in completed {
        state.complete(result);
    }
}

/// Cloneable reference to an `IoService`, for tasks and `File`s.
///
/// Keeps the ring alive; the poll thread stops when the `IoService` itself
/// is dropped.
#[derive(Clone)]
pub struct IoHandle {
    shared: Arc<IoShared>,
}

impl IoHandle {
    /// Queue a read of `buf.len()` bytes at `offset` into `buf`
    pub fn read(&self, fd: RawFd, mut buf: Vec<u8>, offset: u64) -> IoOperation {
        let ptr = buf.as_mut_ptr();
        let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
        let state = OpState::new(buf);
        let entry = opcode::Read::new(types::Fd(fd), ptr, len)
            .offset(offset)
            .build();
        self.shared.submit(&state, entry);
        IoOperation::new(state)
    }

    /// Queue a write of `buf` at `offset`
    pub fn write(&self, fd: RawFd, buf: Vec<u8>, offset: u64) -> IoOperation {
        let ptr = buf.as_ptr();
        let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
        let state = OpState::new(buf);
        let entry = opcode::Write::new(types::Fd(fd), ptr, len)
            .offset(offset)
            .build();
        self.shared.submit(&state, entry);
        IoOperation::new(state)
    }

    /// Send queued operations to the kernel
    pub fn flush(&self) -> IoResult<usize> {
        self.shared.flush()
    }

    /// Complete every operation whose CQE has arrived. Returns the count.
    pub fn process_events(&self) -> usize {
        self.shared.process_events()
    }

    /// Operations queued or in flight whose completion is not processed
    pub fn inflight(&self) -> usize {
        self.shared.ring.with_lock(|ring| ring.outstanding())
    }
}

impl std::fmt::Debug for IoHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoHandle")
            .field("inflight", &self.inflight())
            .finish()
    }
}

struct PollThread {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct IoService {
    handle: IoHandle,
    poller: Option<PollThread>,
}

impl IoService {
    pub fn new() -> IoResult<Self> {
        Self::with_config(IoConfig::from_env())
    }

    pub fn with_config(config: IoConfig) -> IoResult<Self> {
        config.validate()?;

        let ring = Ring::new(config.ring_entries)?;
        let eventfd = EventFd::create()?;
        ring.register_eventfd(eventfd.as_raw_fd())?;

        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC)
            .map_err(|e| IoError::Epoll(e as i32))?;
        epoll
            .add(
                &eventfd,
                EpollEvent::new(EpollFlags::EPOLLIN | EpollFlags::EPOLLET, 0),
            )
            .map_err(|e| IoError::Epoll(e as i32))?;

        kdebug!("io service ready: {} ring entries", config.ring_entries);

        Ok(Self {
            handle: IoHandle {
                shared: Arc::new(IoShared {
                    ring: Mutex::new(ring),
                    eventfd,
                    epoll,
                    config,
                }),
            },
            poller: None,
        })
    }

    pub fn handle(&self) -> IoHandle {
        self.handle.clone()
    }

    pub fn read(&self, fd: RawFd, buf: Vec<u8>, offset: u64) -> IoOperation {
        self.handle.read(fd, buf, offset)
    }

    pub fn write(&self, fd: RawFd, buf: Vec<u8>, offset: u64) -> IoOperation {
        self.handle.write(fd, buf, offset)
    }

    pub fn flush(&self) -> IoResult<usize> {
        self.handle.flush()
    }

    pub fn process_events(&self) -> usize {
        self.handle.process_events()
    }

    pub fn inflight(&self) -> usize {
        self.handle.inflight()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    /// Start the background thread that completes operations as their CQEs
    /// arrive. Calling it again while running does nothing.
    pub fn enable_poll_events(&mut self) -> IoResult<()> {
        if self.poller.is_some() {
            return Ok(());
        }

        let token = CancellationToken::new();
        let shared = Arc::clone(&self.handle.shared);
        let thread_token = token.clone();
        let handle = thread::Builder::new()
            .name("weft-io-poll".to_string())
            .spawn(move || poll_loop(&shared, &thread_token))
            .map_err(|e| IoError::Spawn(e.to_string()))?;

        self.poller = Some(PollThread { token, handle });
        kinfo!("io poll thread started");
        Ok(())
    }
}

fn poll_loop(shared: &IoShared, token: &CancellationToken) {
    let mut events = vec![EpollEvent::empty(); shared.config.max_events];
    let timeout = shared.config.poll_timeout_ms();

    while !token.is_cancelled() {
        match shared.epoll.wait(&mut events, timeout) {
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(e) => {
                kerror!("epoll_wait failed: {}", e);
                break;
            }
        }
        if token.is_cancelled() {
            break;
        }

        // Drain before processing: a CQE posted after this read re-arms
        // the edge and is picked up on the next turn
        shared.eventfd.drain();
        shared.process_events();
    }

    kdebug!("io poll thread stopped");
}

impl Drop for IoService {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.token.cancel();
            self.handle.shared.eventfd.notify();
            if poller.handle.join().is_err() {
                kwarn!("io poll thread exited by panic");
            }
        }

        // Completions that arrived after the poll thread stopped
        self.process_events();

        let outstanding = self.inflight();
        if outstanding > 0 {
            // Their buffers stay allocated: the kernel may still write them
            kwarn!("io service dropped with {} operations in flight", outstanding);
        }
    }
}

impl std::fmt::Debug for IoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoService")
            .field("inflight", &self.inflight())
            .field("polling", &self.is_polling())
            .finish()
    }
}
