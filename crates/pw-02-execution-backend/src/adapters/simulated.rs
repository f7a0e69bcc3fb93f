//! # Simulated Engine
//!
//! Stands in for a real package engine. Each role runs a fixed number of
//! timed steps, reporting progress after each and checking for cancellation
//! before each. Parameter validation mirrors what a real engine rejects up
//! front.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use shared_types::{
    ExecutionError, ExecutionErrorKind, ExecutionJob, TransactionProgress, TransactionRequest,
    TransactionRole,
};
use tracing::debug;

use crate::domain::EngineError;
use crate::ports::{ExecutionContext, PackageEngine};

/// Default duration of a single simulated step.
pub const DEFAULT_STEP: Duration = Duration::from_millis(200);

pub struct SimulatedEngine {
    step: Duration,
    failures: HashMap<TransactionRole, ExecutionError>,
}

impl SimulatedEngine {
    pub fn new(step: Duration) -> Self {
        Self {
            step,
            failures: HashMap::new(),
        }
    }

    /// Every job of `role` fails with `error` after its first step.
    #[must_use]
    pub fn with_failure(mut self, role: TransactionRole, error: ExecutionError) -> Self {
        self.failures.insert(role, error);
        self
    }

    fn steps(request: &TransactionRequest) -> u8 {
        match request {
            TransactionRequest::UpdateCache => 4,
            TransactionRequest::InstallFile { .. } => 3,
            TransactionRequest::CommitChanges { instructions } => {
                (instructions.len().clamp(1, 10) as u8) + 1
            }
            TransactionRequest::UpgradeSystem { safe: true } => 5,
            TransactionRequest::UpgradeSystem { safe: false } => 8,
            TransactionRequest::DownloadArchives { packages, .. } => {
                packages.len().clamp(1, 10) as u8
            }
        }
    }

    fn validate(request: &TransactionRequest) -> Result<(), ExecutionError> {
        match request {
            TransactionRequest::InstallFile { path } if path.as_os_str().is_empty() => Err(
                ExecutionError::new(ExecutionErrorKind::InvalidParameters, "empty package path"),
            ),
            TransactionRequest::DownloadArchives { packages, .. } if packages.is_empty() => {
                Err(ExecutionError::new(
                    ExecutionErrorKind::InvalidParameters,
                    "no packages to download",
                ))
            }
            _ => Ok(()),
        }
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new(DEFAULT_STEP)
    }
}

impl PackageEngine for SimulatedEngine {
    fn execute(
        &mut self,
        job: &ExecutionJob,
        ctx: &mut ExecutionContext,
    ) -> Result<(), EngineError> {
        Self::validate(&job.request)?;

        let role = job.request.role();
        let steps = Self::steps(&job.request);
        debug!(tx_id = %job.id, role = %role, steps, "Simulating job");

        for step in 1..=steps {
            ctx.checkpoint()?;
            thread::sleep(self.step);

            if let Some(error) = self.failures.get(&role) {
                return Err(error.clone().into());
            }

            let percentage = (u16::from(step) * 100 / u16::from(steps)) as u8;
            ctx.report_progress(
                TransactionProgress::new(percentage)
                    .with_message(format!("{role}: step {step}/{steps}")),
            );
        }

        Ok(())
    }
}
