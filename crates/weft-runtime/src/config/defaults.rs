//! Library defaults for `PoolConfig`

/// Worker thread name prefix; workers are named `{prefix}-{index}`
pub const THREAD_NAME: &str = "weft-worker";

/// Upper bound on the worker count accepted by `validate()`
pub const MAX_THREADS: usize = 1024;

/// Smallest stack size accepted by `validate()` when one is set
pub const MIN_STACK_SIZE: usize = 64 * 1024;

/// Worker count when none is configured: one per available CPU
pub fn num_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
