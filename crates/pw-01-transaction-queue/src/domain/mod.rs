//! # Domain Layer - Transaction Queue Subsystem
//!
//! Pure queueing logic, independent of transport and execution.
//!
//! ## Components
//!
//! - `entities`: Transaction and its state machine
//! - `queue`: TransactionQueue with FIFO single-slot dispatch
//! - `idle`: IdleSupervisor shutdown decision
//! - `admission`: AdmissionService, the authorization-gated entry point
//! - `errors`: QueueError, AdmissionError

pub mod admission;
pub mod entities;
pub mod errors;
pub mod idle;
pub mod queue;

pub use admission::*;
pub use entities::*;
pub use errors::*;
pub use idle::*;
pub use queue::*;
