//! # Error Types
//!
//! Error types that cross crate or process boundaries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of an execution failure reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionErrorKind {
    /// The package database lock could not be taken.
    LockFailed,
    /// Fetching lists or archives failed.
    FetchFailed,
    /// Applying changes to the system failed.
    CommitFailed,
    /// The request parameters were rejected by the engine.
    InvalidParameters,
    /// The engine's own per-operation authorization denied the request.
    NotAuthorized,
    /// The service stopped before the transaction could run.
    ServiceStopping,
    /// Anything else, including a crashed engine.
    Internal,
}

impl std::fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExecutionErrorKind::LockFailed => "lock failed",
            ExecutionErrorKind::FetchFailed => "fetch failed",
            ExecutionErrorKind::CommitFailed => "commit failed",
            ExecutionErrorKind::InvalidParameters => "invalid parameters",
            ExecutionErrorKind::NotAuthorized => "not authorized",
            ExecutionErrorKind::ServiceStopping => "service stopping",
            ExecutionErrorKind::Internal => "internal error",
        };
        f.write_str(name)
    }
}

/// Failure detail attached to a `Failed` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {detail}")]
pub struct ExecutionError {
    /// Failure category.
    pub kind: ExecutionErrorKind,
    /// Engine supplied detail.
    pub detail: String,
}

impl ExecutionError {
    /// Create an execution error.
    pub fn new(kind: ExecutionErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Shorthand for an internal error.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::Internal, detail)
    }
}

/// Errors related to wire message handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// Message version not supported.
    #[error("Unsupported version: received {received}, supported {supported}")]
    UnsupportedVersion { received: u16, supported: u16 },

    /// Frame could not be decoded.
    #[error("Malformed frame: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_display() {
        let err = ExecutionError::new(ExecutionErrorKind::FetchFailed, "404 on Packages.xz");
        assert_eq!(err.to_string(), "fetch failed: 404 on Packages.xz");
    }

    #[test]
    fn test_unsupported_version_message() {
        let err = MessageError::UnsupportedVersion {
            received: 7,
            supported: 1,
        };
        assert!(err.to_string().contains("received 7"));
    }
}
