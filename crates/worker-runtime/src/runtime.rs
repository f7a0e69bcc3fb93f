//! # Worker Runtime
//!
//! Owns every long-lived component and their tasks.
//!
//! ## Startup Sequence
//!
//! 1. (caller) Take the instance lock
//! 2. Spawn the execution backend thread
//! 3. Build queue, admission, supervisor and facade around it
//! 4. Bind the socket
//! 5. Start the report handler, idle timer and accept loop
//!
//! ## Shutdown Sequence
//!
//! ```text
//! idle timer: try_stop() accepted ──→ backend Quit ──→ Stopped report ──┐
//!                                                                       ├─→ close transport, join thread
//! signal: stop accepting ──→ try_stop() until accepted ──→ Stopped ─────┘
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use pw_01_transaction_queue::{
    AdmissionService, Authorizer, BusNotifier, IdleSupervisor, QueueConfig, SystemTimeSource,
    TimeSource, TransactionQueue,
};
use pw_02_execution_backend::{
    spawn_backend, BackendError, BackendReport, PackageEngine, SimulatedEngine, WorkerHandle,
};
use shared_bus::InMemoryEventBus;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use worker_telemetry::log_event;

use crate::adapters::PolicyAuthorizer;
use crate::config::WorkerConfig;
use crate::handlers::{BackendReportHandler, IdleTimer};
use crate::service::WorkerService;
use crate::transport::SocketServer;

/// How often a signal-initiated drain retries the stop.
const DRAIN_POLL: Duration = Duration::from_millis(250);

/// The assembled worker.
pub struct WorkerRuntime {
    config: WorkerConfig,
    bus: Arc<InMemoryEventBus>,
    backend: Arc<WorkerHandle>,
    reports: mpsc::UnboundedReceiver<BackendReport>,
    queue: Arc<TransactionQueue>,
    supervisor: Arc<IdleSupervisor>,
    service: Arc<WorkerService>,
}

impl WorkerRuntime {
    /// Production wiring: simulated engine, policy authorizer, system clock.
    pub fn new(config: WorkerConfig) -> Result<Self, BackendError> {
        let engine = SimulatedEngine::new(config.simulated_step());
        let authorizer = Arc::new(PolicyAuthorizer::from_config(&config.authorization));
        Self::with_parts(config, Box::new(engine), authorizer, Arc::new(SystemTimeSource))
    }

    /// Wiring with explicit engine, authorizer and clock.
    pub fn with_parts(
        config: WorkerConfig,
        engine: Box<dyn PackageEngine>,
        authorizer: Arc<dyn Authorizer>,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, BackendError> {
        let bus = Arc::new(InMemoryEventBus::new());
        let (handle, reports) = spawn_backend(engine, time.clone())?;
        let backend = Arc::new(handle);

        let queue = Arc::new(TransactionQueue::new(
            QueueConfig {
                finished_history: config.finished_history,
            },
            backend.clone(),
            Arc::new(BusNotifier::new(bus.clone())),
            time.clone(),
        ));
        let admission = Arc::new(AdmissionService::new(
            queue.clone(),
            authorizer,
            time.clone(),
            config.authorization.action_prefix.clone(),
        ));
        let supervisor = Arc::new(IdleSupervisor::new(
            queue.clone(),
            backend.clone(),
            time,
            config.idle.timeout_ms,
        ));
        let service = Arc::new(WorkerService::new(admission, config.archive_cache_dir.clone()));

        Ok(Self {
            config,
            bus,
            backend,
            reports,
            queue,
            supervisor,
            service,
        })
    }

    pub fn service(&self) -> &Arc<WorkerService> {
        &self.service
    }

    pub fn queue(&self) -> &Arc<TransactionQueue> {
        &self.queue
    }

    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }

    /// Serve until idle shutdown or a termination signal.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until idle shutdown or until `stop` completes, whichever comes
    /// first. `stop` starts a drain: no new connections, running and queued
    /// work finishes, then the worker exits.
    pub async fn run_until<F>(self, stop: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            bus,
            backend,
            reports,
            queue,
            supervisor,
            service,
        } = self;

        let server = SocketServer::bind(&config.socket_path(), service, bus.clone())
            .with_context(|| format!("binding {}", config.socket_path().display()))?
            .with_max_frame_bytes(config.max_frame_bytes);

        let (accept_tx, accept_rx) = watch::channel(false);
        let (sessions_tx, sessions_rx) = watch::channel(false);
        let (idle_tx, idle_rx) = watch::channel(false);

        let mut pump = tokio::spawn(BackendReportHandler::new(reports, queue.clone()).run());
        let idle = tokio::spawn(
            IdleTimer::new(supervisor, bus, config.idle_check_interval()).run(idle_rx),
        );
        let transport = tokio::spawn(server.run(accept_rx, sessions_rx));

        info!(
            socket = %config.socket_path().display(),
            idle_timeout_ms = config.idle.timeout_ms,
            "Worker ready"
        );

        tokio::select! {
            result = &mut pump => {
                if let Err(e) = result {
                    error!(error = %e, "Report handler failed");
                }
            }
            () = stop => {
                log_event!(info, "runtime", "Stop requested, draining", depth = queue.len());
                let _ = accept_tx.send(true);
                let _ = idle_tx.send(true);
                while !queue.try_stop() {
                    tokio::time::sleep(DRAIN_POLL).await;
                }
                if let Err(e) = pump.await {
                    error!(error = %e, "Report handler failed");
                }
            }
        }

        let _ = accept_tx.send(true);
        let _ = idle_tx.send(true);
        let _ = sessions_tx.send(true);
        if let Err(e) = transport.await {
            warn!(error = %e, "Transport task failed");
        }
        if let Err(e) = idle.await {
            warn!(error = %e, "Idle timer task failed");
        }

        let joined = tokio::task::spawn_blocking(move || backend.join())
            .await
            .context("joining executor thread")?;
        if !joined {
            anyhow::bail!("executor thread panicked");
        }

        info!("Worker stopped");
        Ok(())
    }
}

/// Completes on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
