//! Named, filesystem-scoped mutual exclusion.
//!
//! Passes that must not run concurrently (spawning a cancel worker,
//! restarting the leader) take a named lock before acting. The lock is a
//! file created with `create_new`, so acquisition is atomic across
//! processes sharing the directory, and it is released unconditionally on
//! drop.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::LedgerError;

/// Guard for a held filesystem lock. Dropping releases the lock.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Try to acquire the lock named `name` under `dir`.
    ///
    /// Returns `Ok(None)` when another holder already has it - the caller
    /// defers the operation to a later pass.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the lock directory cannot be created
    /// or the lock file cannot be written.
    pub fn try_acquire(dir: &Path, name: &str) -> Result<Option<Self>, LedgerError> {
        fs::create_dir_all(dir).map_err(|e| LedgerError::io(dir.display().to_string(), e))?;
        let path = dir.join(format!("{name}.lock"));

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = write!(file, "{}", std::process::id());
                Ok(Some(Self { path }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(LedgerError::io(path.display().to_string(), e)),
        }
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to release file lock");
        }
    }
}
