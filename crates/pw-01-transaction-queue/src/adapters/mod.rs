//! Adapters layer for the Transaction Queue subsystem.
//!
//! Connects the `QueueNotifier` port to the shared event bus.

pub mod notifier;

pub use notifier::{BusNotifier, NoOpNotifier};
