//! # IPC Message Payloads
//!
//! Requests, responses and notifications exchanged over the worker socket.
//!
//! ## Design Rules
//!
//! - Requests and responses are wrapped in [`Envelope<T>`].
//! - Payloads MUST NOT contain `uid` fields; identity comes from the socket
//!   peer credential.
//! - Notifications are unsolicited and carry no correlation id.
//!
//! ## Framing
//!
//! One JSON document per line. The client writes `Envelope<WorkerRequest>`
//! lines; the server writes [`ServerFrame`] lines.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::entities::{
    PackageInstructions, QueueSnapshot, TransactionId, TransactionProgress, TransactionSnapshot,
    TransactionStatus,
};
use crate::envelope::Envelope;
use crate::errors::ExecutionError;

// =============================================================================
// REQUESTS
// =============================================================================

/// Every operation a client can ask the worker to perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum WorkerRequest {
    /// Queue a package list refresh. Returns a transaction id.
    UpdateCache,
    /// Queue a local package install. Returns a transaction id.
    InstallFile {
        /// Package file path, passed through to the engine.
        path: PathBuf,
    },
    /// Queue a set of package changes. Returns a transaction id.
    CommitChanges {
        /// Package name to requested action/version.
        instructions: PackageInstructions,
    },
    /// Queue a system upgrade. Returns a transaction id.
    UpgradeSystem {
        /// Restrict to upgrades that need no new installs or removals.
        safe: bool,
    },
    /// Queue an archive download. Returns a transaction id.
    DownloadArchives {
        /// Package names, in caller order.
        packages: Vec<String>,
        /// Destination directory.
        destination: PathBuf,
    },
    /// Write a file as root. Requires authorization. Returns a bool.
    WriteFileToDisk {
        /// File contents.
        contents: String,
        /// Target path.
        path: PathBuf,
    },
    /// Copy an archive into the archive cache. Requires authorization.
    /// Returns a bool.
    CopyArchiveToCache {
        /// Source archive path.
        archive_path: PathBuf,
    },
    /// Cancel a queued or running transaction. Returns a bool.
    CancelTransaction {
        /// Transaction to cancel.
        id: TransactionId,
    },
    /// Look up a transaction. Returns a snapshot.
    GetTransaction {
        /// Transaction to look up.
        id: TransactionId,
    },
    /// Current queue membership.
    GetQueue,
    /// Prometheus text exposition of the worker metrics.
    GetMetrics,
}

impl WorkerRequest {
    /// Method name for logging.
    #[must_use]
    pub fn method_name(&self) -> &'static str {
        match self {
            WorkerRequest::UpdateCache => "UpdateCache",
            WorkerRequest::InstallFile { .. } => "InstallFile",
            WorkerRequest::CommitChanges { .. } => "CommitChanges",
            WorkerRequest::UpgradeSystem { .. } => "UpgradeSystem",
            WorkerRequest::DownloadArchives { .. } => "DownloadArchives",
            WorkerRequest::WriteFileToDisk { .. } => "WriteFileToDisk",
            WorkerRequest::CopyArchiveToCache { .. } => "CopyArchiveToCache",
            WorkerRequest::CancelTransaction { .. } => "CancelTransaction",
            WorkerRequest::GetTransaction { .. } => "GetTransaction",
            WorkerRequest::GetQueue => "GetQueue",
            WorkerRequest::GetMetrics => "GetMetrics",
        }
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

/// Error codes carried by [`IpcError`].
pub mod error_codes {
    /// Frame could not be parsed or had the wrong version.
    pub const PROTOCOL: i32 = -32600;
    /// The caller is not allowed to perform the operation.
    pub const NOT_AUTHORIZED: i32 = -32001;
    /// The referenced transaction does not exist.
    pub const NOT_FOUND: i32 = -32002;
    /// The operation is invalid in the transaction's current state.
    pub const INVALID_STATE: i32 = -32003;
    /// The service is shutting down and admits no new work.
    pub const SHUTTING_DOWN: i32 = -32004;
    /// Unexpected server side failure.
    pub const INTERNAL: i32 = -32603;
}

/// Error returned in place of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcError {
    /// One of [`error_codes`].
    pub code: i32,
    /// Human readable message.
    pub message: String,
}

impl IpcError {
    /// Create an error response.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for IpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for IpcError {}

/// Result of a [`WorkerRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", content = "value")]
pub enum WorkerResponse {
    /// A transaction was admitted.
    TransactionId(TransactionId),
    /// Boolean outcome (file helpers, cancellation).
    Bool(bool),
    /// Transaction snapshot.
    Transaction(TransactionSnapshot),
    /// Queue membership.
    Queue(QueueSnapshot),
    /// Prometheus text exposition.
    Metrics(String),
    /// The request failed.
    Error(IpcError),
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// Unsolicited events pushed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", content = "data")]
pub enum WorkerNotification {
    /// Queue membership changed. Sent to every session.
    QueueChanged(QueueSnapshot),
    /// A transaction changed status. Sent to the originating session only.
    TransactionStatusChanged {
        /// Transaction that changed.
        id: TransactionId,
        /// New status.
        status: TransactionStatus,
        /// Failure detail when the new status is `Failed`.
        error: Option<ExecutionError>,
    },
    /// A running transaction reported progress. Sent to the originating
    /// session only.
    TransactionProgress {
        /// Transaction that progressed.
        id: TransactionId,
        /// New progress.
        progress: TransactionProgress,
    },
}

/// A line written by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "lowercase")]
pub enum ServerFrame {
    /// Reply to a request.
    Response(Envelope<WorkerResponse>),
    /// Unsolicited notification.
    Notification(WorkerNotification),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let frame = Envelope::new(3, WorkerRequest::UpgradeSystem { safe: true });
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["correlation_id"], 3);
        assert_eq!(json["payload"]["method"], "UpgradeSystem");
        assert_eq!(json["payload"]["params"]["safe"], true);
    }

    #[test]
    fn test_unit_request_parses_without_params() {
        let frame: Envelope<WorkerRequest> =
            serde_json::from_str(r#"{"version":1,"correlation_id":9,"payload":{"method":"UpdateCache"}}"#)
                .unwrap();
        assert_eq!(frame.payload, WorkerRequest::UpdateCache);
    }

    #[test]
    fn test_server_frame_roundtrip_keeps_kind() {
        let frame = ServerFrame::Notification(WorkerNotification::QueueChanged(QueueSnapshot {
            active: None,
            queue: vec![],
        }));
        let line = serde_json::to_string(&frame).unwrap();
        assert!(line.contains(r#""kind":"notification""#));
        let parsed: ServerFrame = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_method_names() {
        assert_eq!(WorkerRequest::GetQueue.method_name(), "GetQueue");
        assert_eq!(
            WorkerRequest::CopyArchiveToCache {
                archive_path: PathBuf::from("/tmp/a.deb")
            }
            .method_name(),
            "CopyArchiveToCache"
        );
    }
}
