//! # Privileged File Helpers
//!
//! The two synchronous file operations behind `WriteFileToDisk` and
//! `CopyArchiveToCache`. Neither touches the queue. Callers authorize
//! first; these functions only do the I/O.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Result of a cache copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The archive was copied into the cache.
    Copied,
    /// The destination already existed; nothing was copied.
    AlreadyCached,
}

/// Writes the UTF-8 bytes of `contents` to `path`, creating or truncating it.
pub fn write_file(path: &Path, contents: &str) -> io::Result<()> {
    fs::write(path, contents.as_bytes())?;
    info!(path = %path.display(), bytes = contents.len(), "File written");
    Ok(())
}

/// `cache_dir` joined with the archive's file name.
pub fn archive_cache_destination(archive: &Path, cache_dir: &Path) -> io::Result<PathBuf> {
    let name = archive.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", archive.display()),
        )
    })?;
    Ok(cache_dir.join(name))
}

/// Copies `archive` into `cache_dir` unless a file of the same name is
/// already there.
///
/// The bytes go to a temporary file in `cache_dir` that is linked into
/// place only once complete, so a failed copy leaves nothing under the
/// destination name and concurrent copies never overwrite each other.
pub fn copy_archive_to_cache(archive: &Path, cache_dir: &Path) -> io::Result<CopyOutcome> {
    let destination = archive_cache_destination(archive, cache_dir)?;
    if destination.exists() {
        debug!(destination = %destination.display(), "Archive already cached");
        return Ok(CopyOutcome::AlreadyCached);
    }

    let mut source = fs::File::open(archive)?;
    let permissions = source.metadata()?.permissions();
    let mut staged = NamedTempFile::new_in(cache_dir)?;
    let bytes = io::copy(&mut source, staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    fs::set_permissions(staged.path(), permissions)?;

    if let Err(e) = staged.persist_noclobber(&destination) {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            debug!(destination = %destination.display(), "Archive cached concurrently");
            return Ok(CopyOutcome::AlreadyCached);
        }
        return Err(e.error);
    }
    info!(
        source = %archive.display(),
        destination = %destination.display(),
        bytes,
        "Archive copied to cache"
    );
    Ok(CopyOutcome::Copied)
}
