//! Cross-crate integration flows.

pub mod harness;

mod flows;
mod shutdown;
