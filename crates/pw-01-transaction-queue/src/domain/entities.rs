//! # Transaction Entity
//!
//! The unit of work owned by the queue, and its state machine.
//!
//! ```text
//! [Queued] ──start──→ [Running] ──finish(Succeeded)──→ [Finished]
//!    │                    ├──────finish(Failed)────────→ [Failed]
//!    │                    └──────finish(Cancelled)─────→ [Cancelled]
//!    ├──cancel──────────────────────────────────────────→ [Cancelled]
//!    └──abort (service stopping)────────────────────────→ [Failed]
//! ```
//!
//! Identity, caller and request are fixed at construction. Only status,
//! progress, error and the timestamps ever change.

use shared_types::{
    CallerIdentity, ExecutionError, ExecutionJob, ExecutionOutcome, SessionId, Timestamp,
    TransactionId, TransactionProgress, TransactionRequest, TransactionRole, TransactionSnapshot,
    TransactionStatus,
};

use super::errors::QueueError;

/// Returns true if `from -> to` is an edge of the transaction state machine.
#[must_use]
pub fn is_valid_transition(from: TransactionStatus, to: TransactionStatus) -> bool {
    use TransactionStatus::*;
    matches!(
        (from, to),
        (Queued, Running)
            | (Queued, Cancelled)
            | (Queued, Failed)
            | (Running, Finished)
            | (Running, Failed)
            | (Running, Cancelled)
    )
}

/// An admitted package-management transaction.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: TransactionId,
    caller: CallerIdentity,
    request: TransactionRequest,
    status: TransactionStatus,
    progress: TransactionProgress,
    error: Option<ExecutionError>,
    created_at: Timestamp,
    started_at: Option<Timestamp>,
    finished_at: Option<Timestamp>,
}

impl Transaction {
    /// Creates a queued transaction with a fresh id.
    pub fn new(caller: CallerIdentity, request: TransactionRequest, now: Timestamp) -> Self {
        Self {
            id: TransactionId::new(),
            caller,
            request,
            status: TransactionStatus::Queued,
            progress: TransactionProgress::default(),
            error: None,
            created_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn caller(&self) -> &CallerIdentity {
        &self.caller
    }

    pub fn session(&self) -> &SessionId {
        &self.caller.session
    }

    pub fn request(&self) -> &TransactionRequest {
        &self.request
    }

    pub fn role(&self) -> TransactionRole {
        self.request.role()
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn progress(&self) -> &TransactionProgress {
        &self.progress
    }

    pub fn error(&self) -> Option<&ExecutionError> {
        self.error.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The job handed to the backend when this transaction is dispatched.
    pub fn job(&self) -> ExecutionJob {
        ExecutionJob::new(self.id, self.request.clone())
    }

    /// Queued -> Running.
    pub fn start(&mut self, now: Timestamp) -> Result<(), QueueError> {
        self.transition(TransactionStatus::Running)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// Running -> terminal, according to the backend's outcome.
    pub fn finish(
        &mut self,
        outcome: ExecutionOutcome,
        now: Timestamp,
    ) -> Result<TransactionStatus, QueueError> {
        if self.status != TransactionStatus::Running {
            return Err(self.rejection(outcome.status()));
        }
        let status = outcome.status();
        self.transition(status)?;
        if let ExecutionOutcome::Failed(error) = outcome {
            self.error = Some(error);
        } else if status == TransactionStatus::Finished {
            self.progress.percentage = 100;
        }
        self.finished_at = Some(now);
        Ok(status)
    }

    /// Queued -> Cancelled. A running transaction is cancelled through the
    /// backend and finishes via [`Transaction::finish`].
    pub fn cancel(&mut self, now: Timestamp) -> Result<(), QueueError> {
        if self.status != TransactionStatus::Queued {
            return Err(self.rejection(TransactionStatus::Cancelled));
        }
        self.transition(TransactionStatus::Cancelled)?;
        self.finished_at = Some(now);
        Ok(())
    }

    /// Queued -> Failed, without ever running.
    pub fn abort(&mut self, error: ExecutionError, now: Timestamp) -> Result<(), QueueError> {
        if self.status != TransactionStatus::Queued {
            return Err(self.rejection(TransactionStatus::Failed));
        }
        self.transition(TransactionStatus::Failed)?;
        self.error = Some(error);
        self.finished_at = Some(now);
        Ok(())
    }

    /// Records progress. Only a running transaction makes progress.
    pub fn update_progress(&mut self, progress: TransactionProgress) -> Result<(), QueueError> {
        if self.status != TransactionStatus::Running {
            return Err(QueueError::NotRunning(self.id));
        }
        self.progress = progress;
        Ok(())
    }

    /// Point-in-time view for status queries and history.
    pub fn snapshot(&self) -> TransactionSnapshot {
        TransactionSnapshot {
            id: self.id,
            uid: self.caller.uid,
            session: self.caller.session.clone(),
            request: self.request.clone(),
            status: self.status,
            progress: self.progress.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    fn transition(&mut self, to: TransactionStatus) -> Result<(), QueueError> {
        if !is_valid_transition(self.status, to) {
            return Err(self.rejection(to));
        }
        self.status = to;
        Ok(())
    }

    fn rejection(&self, to: TransactionStatus) -> QueueError {
        if self.status.is_terminal() {
            QueueError::AlreadyTerminal {
                id: self.id,
                status: self.status,
            }
        } else {
            QueueError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            }
        }
    }
}
