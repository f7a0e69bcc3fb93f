//! # Worker Events
//!
//! Defines all event types that flow through the shared bus. Client facing
//! events convert into the wire-level [`WorkerNotification`].

use serde::{Deserialize, Serialize};
use shared_types::{
    ExecutionError, QueueSnapshot, SessionId, TransactionId, TransactionProgress,
    TransactionStatus, WorkerNotification,
};

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerEvent {
    // =========================================================================
    // TRANSACTION QUEUE
    // =========================================================================
    /// Queue membership changed. Broadcast to every session.
    QueueChanged(QueueSnapshot),

    /// A transaction moved to a new status.
    TransactionStatusChanged {
        /// The transaction.
        id: TransactionId,
        /// Session the transaction was submitted on.
        session: SessionId,
        /// The new status.
        status: TransactionStatus,
        /// Failure detail when `status` is `Failed`.
        error: Option<ExecutionError>,
    },

    /// A running transaction reported progress.
    TransactionProgress {
        /// The transaction.
        id: TransactionId,
        /// Session the transaction was submitted on.
        session: SessionId,
        /// Latest progress.
        progress: TransactionProgress,
    },

    // =========================================================================
    // LIFECYCLE
    // =========================================================================
    /// The idle supervisor asked the service to stop.
    IdleShutdownRequested {
        /// How long the backend had been idle (ms).
        idle_ms: u64,
    },
}

impl WorkerEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::QueueChanged(_) => EventTopic::Queue,
            Self::TransactionStatusChanged { .. } | Self::TransactionProgress { .. } => {
                EventTopic::Transaction
            }
            Self::IdleShutdownRequested { .. } => EventTopic::Lifecycle,
        }
    }

    /// The session this event is addressed to, if it is not a broadcast.
    #[must_use]
    pub fn session(&self) -> Option<&SessionId> {
        match self {
            Self::TransactionStatusChanged { session, .. }
            | Self::TransactionProgress { session, .. } => Some(session),
            _ => None,
        }
    }

    /// The client facing form of this event, if clients ever see it.
    #[must_use]
    pub fn to_notification(&self) -> Option<WorkerNotification> {
        match self {
            Self::QueueChanged(snapshot) => {
                Some(WorkerNotification::QueueChanged(snapshot.clone()))
            }
            Self::TransactionStatusChanged {
                id, status, error, ..
            } => Some(WorkerNotification::TransactionStatusChanged {
                id: *id,
                status: *status,
                error: error.clone(),
            }),
            Self::TransactionProgress { id, progress, .. } => {
                Some(WorkerNotification::TransactionProgress {
                    id: *id,
                    progress: progress.clone(),
                })
            }
            Self::IdleShutdownRequested { .. } => None,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Queue membership changes.
    Queue,
    /// Per-transaction status and progress.
    Transaction,
    /// Service lifecycle.
    Lifecycle,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Only accept session-addressed events for this session. Broadcast
    /// events always pass.
    pub session: Option<SessionId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            session: None,
        }
    }

    /// The filter a client session uses: every queue change, and the
    /// transaction events of its own transactions.
    #[must_use]
    pub fn for_session(session: SessionId) -> Self {
        Self {
            topics: vec![EventTopic::Queue, EventTopic::Transaction],
            session: Some(session),
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &WorkerEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let session_match = match (&self.session, event.session()) {
            (Some(wanted), Some(addressed)) => wanted == addressed,
            _ => true,
        };

        topic_match && session_match
    }
}
