//! Runtime error types

use std::error::Error;
use std::fmt;

/// Why a task did not produce a value
#[derive(Debug)]
pub enum TaskError {
    /// The task's computation panicked; carries the panic message
    Panicked(String),
    /// The task's computation returned `Err`
    Failed(Box<dyn Error + Send + Sync>),
}

impl TaskError {
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_string()
        };
        TaskError::Panicked(msg)
    }

    #[inline]
    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked(_))
    }

    /// Recover the concrete error type of a `Failed` task
    pub fn downcast<E: Error + 'static>(self) -> Result<E, Self> {
        match self {
            TaskError::Failed(err) => match err.downcast::<E>() {
                Ok(e) => Ok(*e),
                Err(err) => Err(TaskError::Failed(err)),
            },
            other => Err(other),
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Panicked(msg) => write!(f, "task panicked: {}", msg),
            TaskError::Failed(err) => write!(f, "task failed: {}", err),
        }
    }
}

impl Error for TaskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TaskError::Failed(err) => Some(err.as_ref()),
            TaskError::Panicked(_) => None,
        }
    }
}

/// Thread pool construction errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    InvalidConfig(&'static str),
    /// `thread::Builder::spawn` failed; carries the OS error text
    SpawnFailed(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::InvalidConfig(msg) => write!(f, "invalid pool config: {}", msg),
            PoolError::SpawnFailed(msg) => write!(f, "failed to spawn worker: {}", msg),
        }
    }
}

impl Error for PoolError {}

pub type PoolResult<T> = Result<T, PoolError>;
