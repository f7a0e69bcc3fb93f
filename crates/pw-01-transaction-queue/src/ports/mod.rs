//! Ports layer for the Transaction Queue subsystem.
//!
//! Defines the hexagonal architecture port traits:
//! - Inbound (Driving) ports: API exposed to the service facade
//! - Outbound (Driven) ports: backend, notifier, authorizer, clock

pub mod inbound;
pub mod outbound;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use inbound::*;
pub use outbound::*;
