//! Read a file through the io_uring service
//!
//! Splits the file into chunks, queues one read per chunk, flushes once and
//! lets the poll thread complete them. Each chunk is awaited from a task
//! running on the thread pool.
//!
//! Usage: uring-read [PATH] [CHUNK_SIZE]
//!
//! # Environment Variables
//!
//! - `WEFT_RING_ENTRIES=256` - Submission queue size
//! - `WEFT_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)

#[cfg(target_os = "linux")]
use std::time::Instant;

#[cfg(target_os = "linux")]
use weft::{kerror, kinfo, kwarn, sync_wait, File, IoService, Mode, Task, ThreadPool};

#[cfg(not(target_os = "linux"))]
fn main() {
    weft::kerror!("uring-read needs io_uring (Linux only)");
    std::process::exit(1);
}

// cargo run -p weft-uring-read -- /etc/hostname
#[cfg(target_os = "linux")]
fn main() {
    weft::init_logging();

    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "/proc/self/status".to_string());
    let chunk: usize = args
        .next()
        .and_then(|s| s.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(4096);

    println!("=== weft uring-read ===\n");

    let mut io = match IoService::new() {
        Ok(io) => io,
        Err(e) => {
            kerror!("io_uring unavailable: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = io.enable_poll_events() {
        kerror!("failed to start poll thread: {}", e);
        std::process::exit(1);
    }

    let pool = match ThreadPool::from_env() {
        Ok(pool) => pool,
        Err(e) => {
            kerror!("failed to start pool: {}", e);
            std::process::exit(1);
        }
    };

    let file = match File::open(&io.handle(), &path, Mode::Read) {
        Ok(file) => file,
        Err(e) => {
            kerror!("open {}: {}", path, e);
            std::process::exit(1);
        }
    };

    // procfs reports zero; read at least one chunk
    let size = file.size().unwrap_or(0).max(chunk as u64);
    let chunks = size.div_ceil(chunk as u64);
    kinfo!("reading {} in {} chunk(s) of {} bytes", path, chunks, chunk);

    let start = Instant::now();
    let ops: Vec<_> = (0..chunks)
        .map(|i| file.read_at(vec![0u8; chunk], i * chunk as u64))
        .collect();
    match io.flush() {
        Ok(n) => kinfo!("submitted {} operation(s)", n),
        Err(e) => {
            kerror!("submit failed: {}", e);
            std::process::exit(1);
        }
    }

    let handle = pool.handle();
    let task = Task::new(async move {
        handle.schedule().await;

        let mut data = Vec::new();
        for op in ops {
            let (res, mut buf) = op.await;
            match res {
                Ok(0) => break,
                Ok(n) => {
                    buf.truncate(n);
                    data.extend_from_slice(&buf);
                }
                Err(e) => {
                    kwarn!("chunk read failed: {}", e);
                    break;
                }
            }
        }
        data
    });

    let data = match sync_wait(task) {
        Ok(data) => data,
        Err(e) => {
            kerror!("reader task failed: {}", e);
            std::process::exit(1);
        }
    };

    println!("Read {} bytes in {:?}\n", data.len(), start.elapsed());
    let preview = String::from_utf8_lossy(&data[..data.len().min(512)]);
    println!("{}", preview);
    if data.len() > 512 {
        println!("... ({} more bytes)", data.len() - 512);
    }

    println!("\n=== Done ===");
}
