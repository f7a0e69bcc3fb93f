//! # Shared Bus - Notification Bus for the Worker
//!
//! Carries queue and transaction notifications from the Transaction Queue to
//! every connected client session.
//!
//! ## Rules
//!
//! - The queue publishes; sessions subscribe. The queue never talks to a
//!   session directly.
//! - Publishing never blocks and never drops: each subscriber has its own
//!   queue, and a slow session only delays itself.
//! - Events are delivered to each subscriber in publish order.
//!
//! ```text
//! ┌──────────────────┐                    ┌──────────────┐
//! │ TransactionQueue │                    │  Session A   │
//! │                  │    publish()       │              │
//! │                  │ ──────┐            │              │
//! └──────────────────┘       │            └──────────────┘
//!                            ▼                    ↑
//!                      ┌──────────────┐          │
//!                      │  Event Bus   │          │
//!                      │              │ ─────────┘
//!                      └──────────────┘  subscribe(EventFilter::for_session)
//! ```
//!
//! ## Routing
//!
//! Queue-changed events go to everyone. Per-transaction events carry the
//! originating [`shared_types::SessionId`] and are only queued for that
//! session's subscribers.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, WorkerEvent};
pub use publisher::{BusStats, EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, SubscriptionError};

