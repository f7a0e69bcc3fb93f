//! # Shared Types Crate
//!
//! This crate contains the transaction value types, the wire `Envelope<T>`
//! and the IPC payloads exchanged between the worker daemon and its clients.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Every type that crosses a crate or process
//!   boundary is defined here.
//! - **Transport Identity Only**: Payloads MUST NOT contain `uid` fields.
//!   The caller's identity is resolved from the transport credential when a
//!   connection is accepted and travels as a [`CallerIdentity`] value.
//! - **Immutable Requests**: A [`TransactionRequest`] is fixed at admission;
//!   only status and progress change afterwards.

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod ipc;

pub use entities::*;
pub use envelope::Envelope;
pub use errors::*;
pub use ipc::*;
