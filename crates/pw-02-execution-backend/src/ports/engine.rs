//! # Package Engine Port
//!
//! The opaque engine that performs installs, upgrades and downloads. It is
//! driven from the executor thread only, one job at a time, so it may hold
//! non-reentrant resources such as the package database lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shared_types::{ExecutionJob, TransactionId, TransactionProgress};
use tokio::sync::mpsc;
use tracing::trace;

use crate::domain::{ActivityTracker, BackendReport, EngineError};

/// Performs one job.
///
/// Implementations should call [`ExecutionContext::checkpoint`] between
/// steps so cancellation is honoured, and report progress as they go.
pub trait PackageEngine: Send {
    fn execute(&mut self, job: &ExecutionJob, ctx: &mut ExecutionContext)
        -> Result<(), EngineError>;
}

impl<F> PackageEngine for F
where
    F: FnMut(&ExecutionJob, &mut ExecutionContext) -> Result<(), EngineError> + Send,
{
    fn execute(
        &mut self,
        job: &ExecutionJob,
        ctx: &mut ExecutionContext,
    ) -> Result<(), EngineError> {
        self(job, ctx)
    }
}

/// What an engine can see and do while executing a job.
pub struct ExecutionContext {
    id: TransactionId,
    cancel: Arc<AtomicBool>,
    activity: Arc<ActivityTracker>,
    reports: mpsc::UnboundedSender<BackendReport>,
}

impl ExecutionContext {
    pub(crate) fn new(
        id: TransactionId,
        cancel: Arc<AtomicBool>,
        activity: Arc<ActivityTracker>,
        reports: mpsc::UnboundedSender<BackendReport>,
    ) -> Self {
        Self {
            id,
            cancel,
            activity,
            reports,
        }
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.id
    }

    /// Forwards progress to the queue and counts as backend activity.
    pub fn report_progress(&mut self, progress: TransactionProgress) {
        self.activity.touch();
        trace!(tx_id = %self.id, percentage = progress.percentage, "Progress");
        // Receiver gone means the runtime is tearing down; nothing to tell
        let _ = self.reports.send(BackendReport::Progress {
            id: self.id,
            progress,
        });
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn checkpoint(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}
