//! Adapters connecting the worker's ports to the host system.

pub mod authorizer;
pub mod fs_ops;

pub use authorizer::PolicyAuthorizer;
pub use fs_ops::{archive_cache_destination, copy_archive_to_cache, write_file, CopyOutcome};
