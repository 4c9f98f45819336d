//! Scheduling chain demo
//!
//! Every level hops onto a pool worker with `schedule().await` and then
//! awaits the next level. The leaf returns its depth, which travels back up
//! through each continuation to `sync_wait`.
//!
//! Usage: chain [DEPTH] [ROUNDS]
//!
//! # Environment Variables
//!
//! - `WEFT_NUM_THREADS=4` - Pool size (default: available parallelism)
//! - `WEFT_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use weft::{
    current_worker_id, kdebug, kerror, kinfo, sync_wait, Mutex, PoolHandle, Task, TaskError,
    ThreadPool,
};

type Visits = Arc<Mutex<BTreeMap<usize, usize>>>;

fn chain(pool: PoolHandle, visits: Visits, depth: usize, leaf: usize) -> Task<usize> {
    Task::fallible(async move {
        pool.schedule().await;

        let worker = current_worker_id().unwrap_or(usize::MAX);
        visits.with_lock(|v| *v.entry(worker).or_default() += 1);
        kdebug!("level {} on worker {}", depth, worker);

        if depth == leaf {
            return Ok::<_, TaskError>(depth);
        }
        chain(pool, visits, depth + 1, leaf).await
    })
}

// WEFT_LOG_LEVEL=debug cargo run -p weft-chain -- 5
fn main() {
    weft::init_logging();

    let mut args = std::env::args().skip(1);
    let depth: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(5);
    let rounds: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(1);

    println!("=== weft chain ===\n");

    let pool = match ThreadPool::from_env() {
        Ok(pool) => pool,
        Err(e) => {
            kerror!("failed to start pool: {}", e);
            std::process::exit(1);
        }
    };
    kinfo!("pool running {} threads", pool.num_threads());

    let visits: Visits = Arc::new(Mutex::new(BTreeMap::new()));
    let start = Instant::now();

    for round in 0..rounds {
        match sync_wait(chain(pool.handle(), Arc::clone(&visits), 1, depth)) {
            Ok(leaf) if leaf == depth => kdebug!("round {} reached leaf {}", round, leaf),
            Ok(leaf) => {
                kerror!("round {} returned {} instead of {}", round, leaf, depth);
                std::process::exit(1);
            }
            Err(e) => {
                kerror!("round {} failed: {}", round, e);
                std::process::exit(1);
            }
        }
    }

    let elapsed = start.elapsed();
    println!("Depth:   {}", depth);
    println!("Rounds:  {}", rounds);
    println!("Elapsed: {:?}", elapsed);
    println!("Per hop: {:?}", elapsed / (depth * rounds).max(1) as u32);

    println!("\nLevels per worker:");
    visits.with_lock(|v| {
        for (worker, count) in v.iter() {
            println!("  worker {:>3}: {}", worker, count);
        }
    });

    println!("\n=== Done ===");
}
