//! Ports layer for the Execution Backend subsystem.
//!
//! The backend is itself the adapter for the queue's `ExecutionBackend`
//! port; its own driven port is the package engine.

pub mod engine;

pub use engine::*;
