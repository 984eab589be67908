//! Project-scoped advisory lock (spec §4.9 step 4, §6: `<project-root>/.<tool>/lock`).
//!
//! Grounded on `neuron-state-fs`'s plain-filesystem style (no extra
//! crate for what `std::fs` already does): exclusive creation of the
//! lock file is the lock; removing it on drop releases it. No `fs2` —
//! matches the teacher's preference for minimal deps per concern.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use cortex_core::error::AgentBusyError;

/// A held advisory lock. Dropping it removes the lock file.
pub struct AdvisoryLock {
    path: PathBuf,
}

impl AdvisoryLock {
    /// Attempt to acquire the lock at `path`. Fails with
    /// [`AgentBusyError`] if the file already exists (another process
    /// holds it) or the directory can't be created.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, AgentBusyError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AgentBusyError(format!("cannot create lock directory: {e}")))?;
        }
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(AgentBusyError(format!("lock file held: {}", path.display())))
            }
            Err(e) => Err(AgentBusyError(format!("cannot create lock file: {e}"))),
        }
    }

    /// Path to the underlying lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock early. Equivalent to dropping it.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_the_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".cortex").join("lock");
        let lock = AdvisoryLock::acquire(&path).unwrap();
        assert!(path.exists());
        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn second_acquire_fails_while_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".cortex").join("lock");
        let _held = AdvisoryLock::acquire(&path).unwrap();
        let second = AdvisoryLock::acquire(&path);
        assert!(second.is_err());
    }

    #[test]
    fn lock_is_available_again_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".cortex").join("lock");
        let first = AdvisoryLock::acquire(&path).unwrap();
        first.release();
        let second = AdvisoryLock::acquire(&path);
        assert!(second.is_ok());
    }
}
