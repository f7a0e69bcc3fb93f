//! # Service Facade
//!
//! The worker's request surface. Every IPC request lands in
//! [`WorkerService::handle`] together with the caller identity the transport
//! resolved for the connection.
//!
//! ## Request Routing
//!
//! | Request | Path | Response |
//! |---------|------|----------|
//! | `UpdateCache`, `InstallFile`, `CommitChanges`, `UpgradeSystem`, `DownloadArchives` | admission → queue | `TransactionId` |
//! | `WriteFileToDisk`, `CopyArchiveToCache` | authorization → file helper | `Bool` |
//! | `CancelTransaction` | ownership check → queue | `Bool` |
//! | `GetTransaction`, `GetQueue` | queue | `Transaction`, `Queue` |
//! | `GetMetrics` | registry | `Metrics` |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pw_01_transaction_queue::{
    AdmissionError, AdmissionService, CancelOutcome, QueueError, TransactionQueue,
    TransactionQueueApi, WRITE_FILE_ACTION,
};
use shared_types::{
    error_codes, CallerIdentity, IpcError, TransactionId, TransactionRequest, TransactionStatus,
    WorkerRequest, WorkerResponse,
};
use tracing::{debug, error, warn};
use worker_telemetry::{
    encode_metrics, log_tx_event, metric_inc, AUTHORIZATION_DENIALS, QUEUE_DEPTH,
    TRANSACTIONS_ADMITTED, TRANSACTIONS_COMPLETED,
};

use crate::adapters::fs_ops::{self, CopyOutcome};

/// Facade over admission, the queue and the file helpers.
pub struct WorkerService {
    admission: Arc<AdmissionService>,
    archive_cache_dir: PathBuf,
}

impl WorkerService {
    pub fn new(admission: Arc<AdmissionService>, archive_cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            admission,
            archive_cache_dir: archive_cache_dir.into(),
        }
    }

    pub fn queue(&self) -> &Arc<TransactionQueue> {
        self.admission.queue()
    }

    /// Serve one request.
    pub async fn handle(&self, caller: &CallerIdentity, request: WorkerRequest) -> WorkerResponse {
        debug!(uid = caller.uid, session = %caller.session, method = request.method_name(), "Request");

        match request {
            WorkerRequest::UpdateCache => self.submit_response(caller, TransactionRequest::UpdateCache),
            WorkerRequest::InstallFile { path } => {
                self.submit_response(caller, TransactionRequest::InstallFile { path })
            }
            WorkerRequest::CommitChanges { instructions } => {
                self.submit_response(caller, TransactionRequest::CommitChanges { instructions })
            }
            WorkerRequest::UpgradeSystem { safe } => {
                self.submit_response(caller, TransactionRequest::UpgradeSystem { safe })
            }
            WorkerRequest::DownloadArchives {
                packages,
                destination,
            } => self.submit_response(
                caller,
                TransactionRequest::download_archives(packages, destination),
            ),
            WorkerRequest::WriteFileToDisk { contents, path } => {
                WorkerResponse::Bool(self.write_file_to_disk(caller, contents, path).await)
            }
            WorkerRequest::CopyArchiveToCache { archive_path } => {
                WorkerResponse::Bool(self.copy_archive_to_cache(caller, &archive_path).await)
            }
            WorkerRequest::CancelTransaction { id } => match self.cancel(caller, id) {
                Ok(_) => WorkerResponse::Bool(true),
                Err(e) => WorkerResponse::Error(ipc_error(&e)),
            },
            WorkerRequest::GetTransaction { id } => match self.admission.transaction(id) {
                Ok(snapshot) => WorkerResponse::Transaction(snapshot),
                Err(e) => WorkerResponse::Error(ipc_error(&e)),
            },
            WorkerRequest::GetQueue => WorkerResponse::Queue(self.admission.queue_snapshot()),
            WorkerRequest::GetMetrics => match encode_metrics() {
                Ok(text) => WorkerResponse::Metrics(text),
                Err(e) => {
                    error!(error = %e, "Metrics encoding failed");
                    WorkerResponse::Error(IpcError::new(error_codes::INTERNAL, e.to_string()))
                }
            },
        }
    }

    // =========================================================================
    // TRANSACTION ROLES
    // =========================================================================

    /// Admit a transaction for `caller`.
    pub fn submit(
        &self,
        caller: &CallerIdentity,
        request: TransactionRequest,
    ) -> Result<TransactionId, AdmissionError> {
        let role = request.role();
        let id = self.admission.submit(caller.clone(), request)?;
        log_tx_event!(info, "service", "Transaction admitted", id, uid = caller.uid, role = %role);
        metric_inc!(TRANSACTIONS_ADMITTED, &[role.as_str()]);
        record_queue_depth(self.queue());
        Ok(id)
    }

    fn submit_response(&self, caller: &CallerIdentity, request: TransactionRequest) -> WorkerResponse {
        match self.submit(caller, request) {
            Ok(id) => WorkerResponse::TransactionId(id),
            Err(e) => WorkerResponse::Error(ipc_error(&e)),
        }
    }

    /// Cancel a transaction owned by `caller` (or any, for root).
    pub fn cancel(
        &self,
        caller: &CallerIdentity,
        id: TransactionId,
    ) -> Result<CancelOutcome, AdmissionError> {
        let outcome = self.admission.cancel(caller, id)?;
        log_tx_event!(
            info,
            "service",
            "Cancellation accepted",
            id,
            uid = caller.uid,
            outcome = ?outcome
        );
        if outcome == CancelOutcome::Removed {
            metric_inc!(TRANSACTIONS_COMPLETED, &[TransactionStatus::Cancelled.as_str()]);
            record_queue_depth(self.queue());
        }
        Ok(outcome)
    }

    // =========================================================================
    // FILE HELPERS
    // =========================================================================

    /// Write `contents` to `path` as root. False on denial or I/O failure.
    pub async fn write_file_to_disk(
        &self,
        caller: &CallerIdentity,
        contents: String,
        path: PathBuf,
    ) -> bool {
        let write = self
            .admission
            .guarded(caller, WRITE_FILE_ACTION, move || {
                tokio::task::spawn_blocking(move || {
                    fs_ops::write_file(&path, &contents).map_err(|e| (path, e))
                })
            })
            .await;

        match self.run_guarded(write).await {
            Some(Ok(())) => true,
            Some(Err((path, e))) => {
                warn!(uid = caller.uid, path = %path.display(), error = %e, "File write failed");
                false
            }
            None => false,
        }
    }

    /// Copy an archive into the archive cache. True if it is cached
    /// afterwards, whether or not this call copied it.
    pub async fn copy_archive_to_cache(&self, caller: &CallerIdentity, archive: &Path) -> bool {
        let source = archive.to_path_buf();
        let cache_dir = self.archive_cache_dir.clone();
        let copy = self
            .admission
            .guarded(caller, WRITE_FILE_ACTION, move || {
                tokio::task::spawn_blocking(move || fs_ops::copy_archive_to_cache(&source, &cache_dir))
            })
            .await;

        match self.run_guarded(copy).await {
            Some(Ok(CopyOutcome::Copied | CopyOutcome::AlreadyCached)) => true,
            Some(Err(e)) => {
                warn!(uid = caller.uid, archive = %archive.display(), error = %e, "Archive copy failed");
                false
            }
            None => false,
        }
    }

    /// Await an authorized blocking task. `None` on denial or a task panic.
    async fn run_guarded<T>(
        &self,
        guarded: Result<tokio::task::JoinHandle<T>, AdmissionError>,
    ) -> Option<T> {
        match guarded {
            Ok(task) => match task.await {
                Ok(result) => Some(result),
                Err(e) => {
                    error!(error = %e, "File helper task failed");
                    None
                }
            },
            Err(AdmissionError::Unauthorized { action }) => {
                metric_inc!(AUTHORIZATION_DENIALS, &[action.as_str()]);
                None
            }
            Err(e) => {
                warn!(error = %e, "Guarded operation refused");
                None
            }
        }
    }
}

/// Update the queue depth gauge.
pub(crate) fn record_queue_depth(queue: &TransactionQueue) {
    QUEUE_DEPTH.set(queue.len() as f64);
}

/// Wire form of an admission failure.
pub fn ipc_error(err: &AdmissionError) -> IpcError {
    let code = match err {
        AdmissionError::Unauthorized { .. } | AdmissionError::NotOwner { .. } => {
            error_codes::NOT_AUTHORIZED
        }
        AdmissionError::ShuttingDown => error_codes::SHUTTING_DOWN,
        AdmissionError::Queue(QueueError::NotFound(_)) => error_codes::NOT_FOUND,
        AdmissionError::Queue(
            QueueError::AlreadyTerminal { .. }
            | QueueError::InvalidTransition { .. }
            | QueueError::NotRunning(_),
        ) => error_codes::INVALID_STATE,
        AdmissionError::Queue(QueueError::InvariantViolation(_)) => error_codes::INTERNAL,
    };
    IpcError::new(code, err.to_string())
}
