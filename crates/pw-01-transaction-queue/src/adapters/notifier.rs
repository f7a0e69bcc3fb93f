//! Event bus notifier.

use std::sync::Arc;

use shared_bus::{EventPublisher, WorkerEvent};
use tracing::trace;

use crate::ports::outbound::QueueNotifier;

/// Publishes queue notifications on the shared bus.
pub struct BusNotifier {
    bus: Arc<dyn EventPublisher>,
}

impl BusNotifier {
    pub fn new(bus: Arc<dyn EventPublisher>) -> Self {
        Self { bus }
    }
}

impl QueueNotifier for BusNotifier {
    fn notify(&self, event: WorkerEvent) {
        let topic = event.topic();
        let receivers = self.bus.publish(event);
        trace!(topic = ?topic, receivers, "Queue notification published");
    }
}

/// Notifier that drops everything. Useful for benchmarks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpNotifier;

impl QueueNotifier for NoOpNotifier {
    fn notify(&self, _event: WorkerEvent) {}
}
