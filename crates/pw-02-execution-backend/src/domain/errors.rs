//! Execution Backend error types.

use shared_types::ExecutionError;
use thiserror::Error;

/// Why an engine stopped before completing a job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The job observed its cancellation flag.
    #[error("cancelled")]
    Cancelled,

    /// The engine failed.
    #[error(transparent)]
    Failed(#[from] ExecutionError),
}

/// Errors starting the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The executor thread could not be spawned.
    #[error("failed to spawn executor thread: {0}")]
    Spawn(#[from] std::io::Error),
}
