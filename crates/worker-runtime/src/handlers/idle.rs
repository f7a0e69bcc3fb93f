//! # Idle Timer
//!
//! Ticks the idle supervisor on a fixed period. Once a stop is accepted the
//! timer announces it on the bus and exits; the executor's `Stopped` report
//! then ends the process.

use std::sync::Arc;
use std::time::Duration;

use pw_01_transaction_queue::{IdleDecision, IdleSupervisor};
use shared_bus::{EventPublisher, WorkerEvent};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;
use worker_telemetry::{metric_inc, time_histogram, IDLE_CHECKS, IDLE_CHECK_DURATION};

pub struct IdleTimer {
    supervisor: Arc<IdleSupervisor>,
    bus: Arc<dyn EventPublisher>,
    period: Duration,
}

impl IdleTimer {
    pub fn new(
        supervisor: Arc<IdleSupervisor>,
        bus: Arc<dyn EventPublisher>,
        period: Duration,
    ) -> Self {
        Self {
            supervisor,
            bus,
            period,
        }
    }

    /// One supervised check.
    pub fn tick(&self) -> IdleDecision {
        let _timer = time_histogram!(IDLE_CHECK_DURATION);
        let decision = self.supervisor.check();
        metric_inc!(IDLE_CHECKS, &[decision.as_str()]);

        if let IdleDecision::Shutdown { idle_ms } = decision {
            self.bus.publish(WorkerEvent::IdleShutdownRequested { idle_ms });
        }
        decision
    }

    /// Runs until a stop is accepted or `shutdown` fires. The first check
    /// happens one period after start. Returns true if this timer stopped
    /// the queue.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> bool {
        let mut ticks = interval_at(Instant::now() + self.period, self.period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            period_ms = self.period.as_millis() as u64,
            threshold_ms = self.supervisor.threshold_ms(),
            "Idle timer started"
        );

        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    if self.tick().is_shutdown() {
                        return true;
                    }
                }
                _ = shutdown.changed() => return false,
            }
        }
    }
}
