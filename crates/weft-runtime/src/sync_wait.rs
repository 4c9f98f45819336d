//! Blocking bridge from ordinary threads into tasks

use crate::error::TaskError;
use crate::task::Task;

/// Start `task` on the calling thread and block until it completes.
///
/// The task runs inline until its first suspension; the caller then sleeps
/// on a one-shot event that the task's completion sets, from whichever
/// thread finishes it. Never call this from a pool worker with a task that
/// needs that worker to make progress.
pub fn sync_wait<T: Send + 'static>(task: Task<T>) -> Result<T, TaskError> {
    task.wait_sync();
    task.into_result()
}
