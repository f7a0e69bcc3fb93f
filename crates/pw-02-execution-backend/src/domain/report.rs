//! Messages crossing between the admission context and the executor thread.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use shared_types::{ExecutionJob, ExecutionOutcome, TransactionId, TransactionProgress};

/// Admission side -> executor thread.
#[derive(Debug)]
pub enum WorkerCommand {
    /// Run a job. `cancel` is shared with the handle so a cancellation
    /// reaches the job even before it starts.
    Execute {
        job: ExecutionJob,
        cancel: Arc<AtomicBool>,
    },
    /// Exit, unless more work is already waiting.
    Quit,
}

/// Executor thread -> admission side.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendReport {
    /// The running job made progress.
    Progress {
        id: TransactionId,
        progress: TransactionProgress,
    },
    /// The running job ended; the slot is free.
    Finished {
        id: TransactionId,
        outcome: ExecutionOutcome,
    },
    /// The executor thread exited.
    Stopped,
}
