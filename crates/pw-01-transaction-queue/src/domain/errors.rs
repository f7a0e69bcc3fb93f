//! Transaction Queue error types.

use shared_types::{TransactionId, TransactionStatus, Uid};
use thiserror::Error;

/// Errors raised by queue operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// No live or recently finished transaction has this id.
    #[error("transaction {0} not found")]
    NotFound(TransactionId),

    /// The requested status change is not an edge of the state machine.
    #[error("transaction {id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// The transaction already reached a terminal state.
    #[error("transaction {id} already {status}")]
    AlreadyTerminal {
        id: TransactionId,
        status: TransactionStatus,
    },

    /// A completion or progress report named a transaction that does not
    /// hold the execution slot.
    #[error("transaction {0} is not running")]
    NotRunning(TransactionId),

    /// Two transactions would hold the execution slot at once.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Errors raised while admitting a request.
///
/// Admission errors never leave state behind: no transaction exists and no
/// side effect happened when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// The authorization service denied the action.
    #[error("not authorized for {action}")]
    Unauthorized { action: String },

    /// Only the submitting user or root may manage a transaction.
    #[error("uid {uid} does not own transaction {id}")]
    NotOwner { id: TransactionId, uid: Uid },

    /// The service accepted a stop request and admits no new work.
    #[error("service is shutting down")]
    ShuttingDown,

    /// The queue rejected the operation.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// The execution backend can no longer accept work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("execution backend unavailable")]
pub struct BackendUnavailable;
