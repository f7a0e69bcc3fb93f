//! # Executor Thread and Handle
//!
//! ```text
//!  admission context                      executor thread
//! ┌──────────────────┐  WorkerCommand   ┌──────────────────────┐
//! │ WorkerHandle     │ ───────────────→ │ loop {               │
//! │ (ExecutionBackend│                  │   Execute → engine   │
//! │  for the queue)  │ ←─────────────── │   Quit    → exit?    │
//! └──────────────────┘  BackendReport   └──────────────────────┘
//! ```
//!
//! The thread owns the engine. Nothing else touches it.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use pw_01_transaction_queue::{BackendUnavailable, ExecutionBackend, TimeSource};
use shared_types::{ExecutionError, ExecutionJob, ExecutionOutcome, Timestamp, TransactionId};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::domain::{ActivityTracker, BackendError, BackendReport, EngineError, WorkerCommand};
use crate::ports::{ExecutionContext, PackageEngine};

/// Name of the executor thread.
pub const EXECUTOR_THREAD_NAME: &str = "pw-executor";

/// Starts the executor thread.
///
/// Returns the handle the queue dispatches through, and the receiver the
/// runtime drains to feed reports back into the queue.
pub fn spawn_backend(
    engine: Box<dyn PackageEngine>,
    time: Arc<dyn TimeSource>,
) -> Result<(WorkerHandle, mpsc::UnboundedReceiver<BackendReport>), BackendError> {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (report_tx, report_rx) = mpsc::unbounded_channel();
    let activity = Arc::new(ActivityTracker::new(time));
    let pending = Arc::new(AtomicUsize::new(0));
    let cancels = Arc::new(Mutex::new(HashMap::new()));

    let executor = Executor {
        engine,
        commands: command_rx,
        reports: report_tx,
        activity: activity.clone(),
        pending: pending.clone(),
        cancels: cancels.clone(),
    };
    let thread = thread::Builder::new()
        .name(EXECUTOR_THREAD_NAME.to_string())
        .spawn(move || executor.run())?;

    info!("Execution backend started");

    let handle = WorkerHandle {
        commands: command_tx,
        activity,
        pending,
        cancels,
        thread: Mutex::new(Some(thread)),
    };
    Ok((handle, report_rx))
}

// =============================================================================
// HANDLE
// =============================================================================

/// Admission-side handle to the executor thread.
pub struct WorkerHandle {
    commands: mpsc::UnboundedSender<WorkerCommand>,
    activity: Arc<ActivityTracker>,
    /// Execute commands sent but not yet picked up.
    pending: Arc<AtomicUsize>,
    /// Cancellation flags of dispatched, unfinished jobs.
    cancels: Arc<Mutex<HashMap<TransactionId, Arc<AtomicBool>>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerHandle {
    pub fn activity(&self) -> &Arc<ActivityTracker> {
        &self.activity
    }

    /// Waits for the executor thread to exit. Blocks; call after a
    /// `Stopped` report or from a blocking context.
    pub fn join(&self) -> bool {
        let Some(thread) = self.thread.lock().take() else {
            return true;
        };
        match thread.join() {
            Ok(()) => true,
            Err(_) => {
                error!("Executor thread panicked");
                false
            }
        }
    }
}

impl ExecutionBackend for WorkerHandle {
    fn dispatch(&self, job: ExecutionJob) -> Result<(), BackendUnavailable> {
        let id = job.id;
        let cancel = Arc::new(AtomicBool::new(false));
        self.cancels.lock().insert(id, cancel.clone());
        self.pending.fetch_add(1, Ordering::SeqCst);

        if self
            .commands
            .send(WorkerCommand::Execute { job, cancel })
            .is_err()
        {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            self.cancels.lock().remove(&id);
            return Err(BackendUnavailable);
        }
        Ok(())
    }

    fn cancel(&self, id: TransactionId) {
        match self.cancels.lock().get(&id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                debug!(tx_id = %id, "Cancellation flagged");
            }
            None => debug!(tx_id = %id, "Cancel for job that is not executing"),
        }
    }

    fn is_busy(&self) -> bool {
        self.activity.is_busy() || self.pending.load(Ordering::SeqCst) > 0
    }

    fn last_active_ms(&self) -> Timestamp {
        self.activity.last_active_ms()
    }

    fn request_quit(&self) {
        if self.commands.send(WorkerCommand::Quit).is_err() {
            debug!("Quit requested but executor already gone");
        }
    }
}

// =============================================================================
// EXECUTOR
// =============================================================================

struct Executor {
    engine: Box<dyn PackageEngine>,
    commands: mpsc::UnboundedReceiver<WorkerCommand>,
    reports: mpsc::UnboundedSender<BackendReport>,
    activity: Arc<ActivityTracker>,
    pending: Arc<AtomicUsize>,
    cancels: Arc<Mutex<HashMap<TransactionId, Arc<AtomicBool>>>>,
}

impl Executor {
    fn run(mut self) {
        while let Some(command) = self.commands.blocking_recv() {
            match command {
                WorkerCommand::Execute { job, cancel } => {
                    self.pending.fetch_sub(1, Ordering::SeqCst);
                    self.execute(job, cancel);
                }
                WorkerCommand::Quit => {
                    if self.pending.load(Ordering::SeqCst) > 0 {
                        warn!("Quit ignored, work is waiting");
                        continue;
                    }
                    info!("Execution backend quitting");
                    break;
                }
            }
        }

        let _ = self.reports.send(BackendReport::Stopped);
    }

    fn execute(&mut self, job: ExecutionJob, cancel: Arc<AtomicBool>) {
        let id = job.id;
        self.activity.begin();
        debug!(tx_id = %id, role = %job.request.role(), "Job started");

        let mut ctx =
            ExecutionContext::new(id, cancel, self.activity.clone(), self.reports.clone());
        let engine = &mut self.engine;
        let result = panic::catch_unwind(AssertUnwindSafe(|| engine.execute(&job, &mut ctx)));

        let outcome = match result {
            Ok(Ok(())) => ExecutionOutcome::Succeeded,
            Ok(Err(EngineError::Cancelled)) => ExecutionOutcome::Cancelled,
            Ok(Err(EngineError::Failed(e))) => ExecutionOutcome::Failed(e),
            Err(payload) => {
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(tx_id = %id, detail = %detail, "Engine panicked");
                ExecutionOutcome::Failed(ExecutionError::internal(format!(
                    "engine panicked: {detail}"
                )))
            }
        };

        self.cancels.lock().remove(&id);
        self.activity.end();
        debug!(tx_id = %id, status = %outcome.status(), "Job ended");

        let _ = self.reports.send(BackendReport::Finished { id, outcome });
    }
}
