//! Outbound (Driven) ports for the Transaction Queue subsystem.
//!
//! These traits define the collaborators the queue needs but does not own:
//! the single-slot execution backend, the notification sink, the
//! authorization service and the clock.

use async_trait::async_trait;
use shared_bus::WorkerEvent;
use shared_types::{CallerIdentity, ExecutionJob, Timestamp, TransactionId};

use crate::domain::BackendUnavailable;

/// The single-slot executor.
///
/// Every method is called from inside the queue's critical section, so
/// implementations must not block: hand the work to the execution context
/// and return.
pub trait ExecutionBackend: Send + Sync {
    /// Start executing a job. The queue guarantees no other job is running.
    fn dispatch(&self, job: ExecutionJob) -> Result<(), BackendUnavailable>;

    /// Ask the running job to stop. Completion is reported later through
    /// the normal finish path.
    fn cancel(&self, id: TransactionId);

    /// Returns true while a job is executing.
    fn is_busy(&self) -> bool;

    /// Timestamp (ms) of the last observable backend activity.
    fn last_active_ms(&self) -> Timestamp;

    /// Ask the backend to shut down once it has nothing to do.
    fn request_quit(&self);
}

/// Sink for queue and transaction notifications.
///
/// Called inside the queue's critical section; emission order therefore
/// matches mutation order.
pub trait QueueNotifier: Send + Sync {
    fn notify(&self, event: WorkerEvent);
}

/// Answers whether a caller may perform an action.
///
/// # Example
///
/// ```rust,ignore
/// if !authorizer.authorize(&caller, "org.pkgworker.worker.writefiletodisk").await {
///     return Err(AdmissionError::Unauthorized { action });
/// }
/// ```
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Returns true if `caller` may perform `action`.
    async fn authorize(&self, caller: &CallerIdentity, action: &str) -> bool;
}

/// Time source for consistent timestamp handling.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Returns the current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}
