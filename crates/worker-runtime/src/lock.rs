//! # Single-Instance Lock
//!
//! Registers the worker as the sole provider of its service. A second
//! instance pointed at the same runtime directory fails here, before any
//! queue, thread or socket exists.
//!
//! Uses `fs2` advisory locking (flock on Unix).

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    /// Runtime directory or lock file could not be created.
    #[error("failed to create lock file {path}: {source}")]
    CreateFailed { path: PathBuf, source: io::Error },

    /// Another worker holds the lock.
    #[error("worker already running{} ({})", .pid.map(|p| format!(" as pid {p}")).unwrap_or_default(), .path.display())]
    AlreadyLocked { pid: Option<u32>, path: PathBuf },

    /// The pid could not be recorded.
    #[error("failed to write pid to lock file: {0}")]
    WriteFailed(io::Error),
}

/// Exclusive lock on the runtime directory, released on drop.
///
/// ```ignore
/// let _lock = InstanceLock::acquire(&config.runtime_dir)?;
/// // the worker owns the service until `_lock` is dropped
/// ```
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
    pid: u32,
}

impl InstanceLock {
    const LOCK_FILE: &'static str = "worker.lock";

    /// Take the lock without blocking.
    ///
    /// # Errors
    ///
    /// `LockError::AlreadyLocked` if another process holds it.
    pub fn acquire(runtime_dir: &Path) -> Result<Self, LockError> {
        let path = runtime_dir.join(Self::LOCK_FILE);
        std::fs::create_dir_all(runtime_dir).map_err(|source| LockError::CreateFailed {
            path: path.clone(),
            source,
        })?;

        // Not truncated on open: a losing contender must not wipe the
        // holder's pid before failing to lock.
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| LockError::CreateFailed {
                path: path.clone(),
                source,
            })?;

        if file.try_lock_exclusive().is_err() {
            return Err(LockError::AlreadyLocked {
                pid: Self::read_existing_pid(&path),
                path,
            });
        }

        let pid = std::process::id();
        file.set_len(0).map_err(LockError::WriteFailed)?;
        writeln!(file, "{pid}").map_err(LockError::WriteFailed)?;
        file.sync_all().map_err(LockError::WriteFailed)?;

        Ok(Self { file, path, pid })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_existing_pid(path: &Path) -> Option<u32> {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        let _ = self.file.unlock();
    }
}
