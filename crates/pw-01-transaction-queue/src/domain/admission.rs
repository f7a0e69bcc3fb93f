//! # Admission
//!
//! Turns authorized requests into queued transactions.
//!
//! ## Rules
//!
//! - Caller identity arrives as a value resolved by the transport; it is
//!   never read from a request payload.
//! - Guarded actions are authorized before any side effect. On denial the
//!   side effect closure is dropped unexecuted.
//! - Transaction roles are admitted without an up-front check; the engine
//!   applies its own per-operation authorization during execution.
//! - Only the submitting uid or root may cancel a transaction.

use std::sync::Arc;

use async_trait::async_trait;
use shared_types::{
    CallerIdentity, QueueSnapshot, TransactionId, TransactionRequest, TransactionSnapshot,
};
use tracing::{info, warn};

use super::entities::Transaction;
use super::errors::{AdmissionError, QueueError};
use super::queue::{CancelOutcome, TransactionQueue};
use crate::ports::inbound::TransactionQueueApi;
use crate::ports::outbound::{Authorizer, TimeSource};

/// Default reverse-domain prefix for action ids.
pub const DEFAULT_ACTION_PREFIX: &str = "org.pkgworker.worker";

/// Action guarding `WriteFileToDisk` and `CopyArchiveToCache`.
pub const WRITE_FILE_ACTION: &str = "writefiletodisk";

/// Authorization-gated entry point to the queue.
pub struct AdmissionService {
    queue: Arc<TransactionQueue>,
    authorizer: Arc<dyn Authorizer>,
    time: Arc<dyn TimeSource>,
    action_prefix: String,
}

impl AdmissionService {
    pub fn new(
        queue: Arc<TransactionQueue>,
        authorizer: Arc<dyn Authorizer>,
        time: Arc<dyn TimeSource>,
        action_prefix: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            authorizer,
            time,
            action_prefix: action_prefix.into(),
        }
    }

    pub fn queue(&self) -> &Arc<TransactionQueue> {
        &self.queue
    }

    /// Fully qualified action id, e.g. `org.pkgworker.worker.writefiletodisk`.
    pub fn action_id(&self, action: &str) -> String {
        format!("{}.{}", self.action_prefix, action)
    }

    /// Authorizes `action`, then runs `op`. `op` never runs on denial.
    pub async fn guarded<F, R>(
        &self,
        caller: &CallerIdentity,
        action: &str,
        op: F,
    ) -> Result<R, AdmissionError>
    where
        F: FnOnce() -> R + Send,
    {
        self.authorize(caller, action).await?;
        Ok(op())
    }
}

#[async_trait]
impl TransactionQueueApi for AdmissionService {
    fn submit(
        &self,
        caller: CallerIdentity,
        request: TransactionRequest,
    ) -> Result<TransactionId, AdmissionError> {
        if self.queue.is_stopped() {
            warn!(uid = caller.uid, role = %request.role(), "Admission refused, shutting down");
            return Err(AdmissionError::ShuttingDown);
        }

        let tx = Transaction::new(caller, request, self.time.now());
        Ok(self.queue.enqueue(tx))
    }

    async fn authorize(&self, caller: &CallerIdentity, action: &str) -> Result<(), AdmissionError> {
        let action_id = self.action_id(action);
        if self.authorizer.authorize(caller, &action_id).await {
            return Ok(());
        }

        warn!(uid = caller.uid, session = %caller.session, action = %action_id, "Authorization denied");
        Err(AdmissionError::Unauthorized { action: action_id })
    }

    fn cancel(
        &self,
        caller: &CallerIdentity,
        id: TransactionId,
    ) -> Result<CancelOutcome, AdmissionError> {
        let snapshot = self.queue.get(&id).ok_or(QueueError::NotFound(id))?;
        if !caller.is_root() && caller.uid != snapshot.uid {
            warn!(tx_id = %id, uid = caller.uid, owner = snapshot.uid, "Cancel refused, not owner");
            return Err(AdmissionError::NotOwner { id, uid: caller.uid });
        }

        let outcome = self.queue.remove(id)?;
        info!(tx_id = %id, uid = caller.uid, outcome = ?outcome, "Cancel accepted");
        Ok(outcome)
    }

    fn transaction(&self, id: TransactionId) -> Result<TransactionSnapshot, AdmissionError> {
        Ok(self.queue.get(&id).ok_or(QueueError::NotFound(id))?)
    }

    fn queue_snapshot(&self) -> QueueSnapshot {
        self.queue.snapshot()
    }
}
