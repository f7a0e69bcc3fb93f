//! Engine adapters.

pub mod simulated;

pub use simulated::SimulatedEngine;
