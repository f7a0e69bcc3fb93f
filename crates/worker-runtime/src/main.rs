//! # Package Worker
//!
//! Privileged daemon that runs package transactions one at a time on
//! behalf of unprivileged clients.
//!
//! ## Exit Status
//!
//! - `0`: idle shutdown or a drained stop after SIGINT/SIGTERM
//! - non-zero: another instance holds the lock, bad configuration, or a
//!   startup failure

use anyhow::{Context, Result};
use tracing::{error, info};
use worker_runtime::{InstanceLock, LockError, WorkerConfig, WorkerRuntime};
use worker_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env())
        .context("failed to initialize telemetry")?;

    let config = WorkerConfig::from_env().context("invalid configuration")?;

    // Nothing else may exist before this succeeds
    let lock = match InstanceLock::acquire(&config.runtime_dir) {
        Ok(lock) => lock,
        Err(e @ LockError::AlreadyLocked { .. }) => {
            error!(error = %e, "Another worker owns the service, exiting");
            return Err(e.into());
        }
        Err(e) => return Err(e).context("failed to take the instance lock"),
    };
    info!(pid = lock.pid(), lock = %lock.path().display(), "Instance lock acquired");

    let runtime = WorkerRuntime::new(config).context("failed to start execution backend")?;
    runtime.run().await?;

    drop(lock);
    Ok(())
}
