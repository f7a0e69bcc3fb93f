//! # Inbound Port - TransactionQueueApi
//!
//! Primary driving port used by the service facade.
//!
//! ## Authorization
//!
//! | Method | Gate |
//! |--------|------|
//! | `submit` | none up front; the engine authorizes per operation |
//! | `authorize` | authorization service, before any guarded side effect |
//! | `cancel` | submitting uid or root |
//! | `transaction`, `queue_snapshot` | none |

use async_trait::async_trait;
use shared_types::{
    CallerIdentity, QueueSnapshot, TransactionId, TransactionRequest, TransactionSnapshot,
};

use crate::domain::{AdmissionError, CancelOutcome};

/// Primary API of the Transaction Queue subsystem.
///
/// # Example
///
/// ```rust,ignore
/// use pw_01_transaction_queue::ports::TransactionQueueApi;
///
/// async fn example(api: &impl TransactionQueueApi, caller: CallerIdentity) {
///     let id = api.submit(caller.clone(), TransactionRequest::UpdateCache)?;
///     let snapshot = api.transaction(id)?;
///     api.cancel(&caller, id)?;
/// }
/// ```
#[async_trait]
pub trait TransactionQueueApi: Send + Sync {
    /// Creates a transaction for `request` and queues it.
    ///
    /// Returns immediately; completion is observed through notifications.
    ///
    /// # Errors
    /// - `ShuttingDown`: the queue was stopped
    fn submit(
        &self,
        caller: CallerIdentity,
        request: TransactionRequest,
    ) -> Result<TransactionId, AdmissionError>;

    /// Checks that `caller` may perform `action`.
    ///
    /// # Errors
    /// - `Unauthorized`: the authorization service denied the action
    async fn authorize(&self, caller: &CallerIdentity, action: &str) -> Result<(), AdmissionError>;

    /// Cancels a queued transaction or asks the backend to stop a running
    /// one.
    ///
    /// # Errors
    /// - `NotOwner`: caller is neither the submitter nor root
    /// - `Queue(NotFound | AlreadyTerminal)`
    fn cancel(
        &self,
        caller: &CallerIdentity,
        id: TransactionId,
    ) -> Result<CancelOutcome, AdmissionError>;

    /// Snapshot of a live or recently finished transaction.
    fn transaction(&self, id: TransactionId) -> Result<TransactionSnapshot, AdmissionError>;

    /// Current queue membership.
    fn queue_snapshot(&self) -> QueueSnapshot;
}
