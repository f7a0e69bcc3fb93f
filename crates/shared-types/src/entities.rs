//! # Core Domain Entities
//!
//! Value types describing a package-management transaction as it is seen
//! from outside the queue: its identity, who asked for it, what it asks for,
//! and how far it got.
//!
//! ## Clusters
//!
//! - **Identity**: `TransactionId`, `SessionId`, `CallerIdentity`
//! - **Request**: `TransactionRole`, `TransactionRequest`, `PackageInstructions`
//! - **Execution State**: `TransactionStatus`, `TransactionProgress`,
//!   `TransactionSnapshot`, `QueueSnapshot`
//! - **Execution Hand-off**: `ExecutionJob`, `ExecutionOutcome`

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ExecutionError;

/// Timestamp in milliseconds since UNIX epoch.
pub type Timestamp = u64;

/// Numeric user id of a caller.
pub type Uid = u32;

/// The superuser. Always allowed to manage any transaction.
pub const ROOT_UID: Uid = 0;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Globally unique transaction identifier.
///
/// Assigned once at admission and never reused for the lifetime of the
/// service process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_simple())
    }
}

impl FromStr for TransactionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identifies the client session a request arrived on.
///
/// Per-transaction notifications are routed back to this session only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the session id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is asking, as resolved from the transport credential.
///
/// Built exactly once when a connection is accepted and carried by value
/// on every transaction created from that connection. Never parsed from a
/// request payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Numeric user id of the peer process.
    pub uid: Uid,
    /// Session the request arrived on.
    pub session: SessionId,
}

impl CallerIdentity {
    /// Create a caller identity.
    pub fn new(uid: Uid, session: SessionId) -> Self {
        Self { uid, session }
    }

    /// Returns true if the caller is the superuser.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.uid == ROOT_UID
    }
}

// =============================================================================
// CLUSTER B: REQUEST
// =============================================================================

/// The kind of privileged operation a transaction performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionRole {
    /// Refresh the package lists.
    UpdateCache,
    /// Install a local package file.
    InstallFile,
    /// Apply a set of package marks (install/remove/upgrade with versions).
    CommitChanges,
    /// Upgrade every upgradable package.
    UpgradeSystem,
    /// Download package archives to a destination directory.
    DownloadArchives,
}

impl TransactionRole {
    /// All roles, in declaration order.
    pub const ALL: [TransactionRole; 5] = [
        TransactionRole::UpdateCache,
        TransactionRole::InstallFile,
        TransactionRole::CommitChanges,
        TransactionRole::UpgradeSystem,
        TransactionRole::DownloadArchives,
    ];

    /// Stable lowercase name, used for log fields and metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionRole::UpdateCache => "update-cache",
            TransactionRole::InstallFile => "install-file",
            TransactionRole::CommitChanges => "commit-changes",
            TransactionRole::UpgradeSystem => "upgrade-system",
            TransactionRole::DownloadArchives => "download-archives",
        }
    }
}

impl fmt::Display for TransactionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Package name to requested action/version. Opaque to the queue.
pub type PackageInstructions = BTreeMap<String, serde_json::Value>;

/// Version marker recorded for every package named in a download request.
pub const PLACEHOLDER_VERSION: i64 = 0;

/// A role together with its role-specific parameters.
///
/// Immutable once the transaction has been admitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "kebab-case")]
pub enum TransactionRequest {
    /// Refresh the package lists.
    UpdateCache,
    /// Install a local package file. The path is passed through untouched.
    InstallFile {
        /// Path of the package file.
        path: PathBuf,
    },
    /// Apply package marks.
    CommitChanges {
        /// Package name to requested action/version.
        instructions: PackageInstructions,
    },
    /// Upgrade the system.
    UpgradeSystem {
        /// Only upgrade packages that need no new installs or removals.
        safe: bool,
    },
    /// Download archives without installing them.
    DownloadArchives {
        /// Package names, each recorded with [`PLACEHOLDER_VERSION`].
        packages: PackageInstructions,
        /// Directory the archives are written to.
        destination: PathBuf,
    },
}

impl TransactionRequest {
    /// Build a download request, recording every name with the placeholder
    /// version marker. Duplicate names collapse into one entry.
    pub fn download_archives<I, S>(names: I, destination: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let packages = names
            .into_iter()
            .map(|name| (name.into(), serde_json::Value::from(PLACEHOLDER_VERSION)))
            .collect();
        TransactionRequest::DownloadArchives {
            packages,
            destination: destination.into(),
        }
    }

    /// The role of this request.
    #[must_use]
    pub fn role(&self) -> TransactionRole {
        match self {
            TransactionRequest::UpdateCache => TransactionRole::UpdateCache,
            TransactionRequest::InstallFile { .. } => TransactionRole::InstallFile,
            TransactionRequest::CommitChanges { .. } => TransactionRole::CommitChanges,
            TransactionRequest::UpgradeSystem { .. } => TransactionRole::UpgradeSystem,
            TransactionRequest::DownloadArchives { .. } => TransactionRole::DownloadArchives,
        }
    }
}

// =============================================================================
// CLUSTER C: EXECUTION STATE
// =============================================================================

/// Transaction lifecycle.
///
/// ```text
/// [Queued] ──dispatch──→ [Running] ──success──→ [Finished]
///    │                       ├──────error────→ [Failed]
///    └──────cancel───────────┴─────cancel────→ [Cancelled]
/// ```
///
/// The three right-hand states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionStatus {
    /// Admitted, waiting for the execution slot.
    #[default]
    Queued,
    /// Holding the execution slot.
    Running,
    /// Completed successfully.
    Finished,
    /// Completed with an execution error.
    Failed,
    /// Cancelled by its caller.
    Cancelled,
}

impl TransactionStatus {
    /// Returns true for `Finished`, `Failed` and `Cancelled`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Finished | TransactionStatus::Failed | TransactionStatus::Cancelled
        )
    }

    /// Stable lowercase name, used for log fields and metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Queued => "queued",
            TransactionStatus::Running => "running",
            TransactionStatus::Finished => "finished",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress as reported by the execution backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionProgress {
    /// Overall completion, 0-100.
    pub percentage: u8,
    /// Human readable description of the current step.
    pub status_message: Option<String>,
    /// Bytes fetched so far, for roles that download.
    pub downloaded_bytes: u64,
    /// Total bytes to fetch, zero if unknown.
    pub total_bytes: u64,
}

impl TransactionProgress {
    /// Create a progress value, clamping the percentage to 100.
    #[must_use]
    pub fn new(percentage: u8) -> Self {
        Self {
            percentage: percentage.min(100),
            ..Self::default()
        }
    }

    /// Attach a status message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }

    /// Attach download counters.
    #[must_use]
    pub fn with_bytes(mut self, downloaded: u64, total: u64) -> Self {
        self.downloaded_bytes = downloaded;
        self.total_bytes = total;
        self
    }
}

/// Point-in-time view of a transaction, as returned by status queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSnapshot {
    /// Transaction identifier.
    pub id: TransactionId,
    /// Requesting user.
    pub uid: Uid,
    /// Originating session.
    pub session: SessionId,
    /// What was requested.
    pub request: TransactionRequest,
    /// Current status.
    pub status: TransactionStatus,
    /// Last reported progress.
    pub progress: TransactionProgress,
    /// Failure detail, set only when `status == Failed`.
    pub error: Option<ExecutionError>,
    /// Admission time (ms).
    pub created_at: Timestamp,
    /// Time the transaction became Running (ms).
    pub started_at: Option<Timestamp>,
    /// Time the transaction reached a terminal state (ms).
    pub finished_at: Option<Timestamp>,
}

impl TransactionSnapshot {
    /// The role of the snapshotted request.
    #[must_use]
    pub fn role(&self) -> TransactionRole {
        self.request.role()
    }
}

/// Queue membership, in dispatch order.
///
/// `queue` lists every non-terminal transaction; when a transaction is
/// running it is `active` and also the head of `queue`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// The running transaction, if any.
    pub active: Option<TransactionId>,
    /// All queued and running transactions, in arrival order.
    pub queue: Vec<TransactionId>,
}

impl QueueSnapshot {
    /// Returns true if nothing is queued or running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

// =============================================================================
// CLUSTER D: EXECUTION HAND-OFF
// =============================================================================

/// What the queue hands to the execution backend on dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionJob {
    /// Transaction being executed.
    pub id: TransactionId,
    /// The request to carry out.
    pub request: TransactionRequest,
}

impl ExecutionJob {
    /// Create a job.
    pub fn new(id: TransactionId, request: TransactionRequest) -> Self {
        Self { id, request }
    }
}

/// How a running transaction ended, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    /// The engine completed the job.
    Succeeded,
    /// The engine reported an error.
    Failed(ExecutionError),
    /// The job observed a cancellation request and stopped.
    Cancelled,
}

impl ExecutionOutcome {
    /// The terminal status this outcome maps to.
    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        match self {
            ExecutionOutcome::Succeeded => TransactionStatus::Finished,
            ExecutionOutcome::Failed(_) => TransactionStatus::Failed,
            ExecutionOutcome::Cancelled => TransactionStatus::Cancelled,
        }
    }
}
