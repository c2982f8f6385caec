// ABOUTME: Single-instance lock marker: pid-tagged file created at startup
// ABOUTME: Released on every exit path through Drop; a live marker fails a second run fast
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error};

/// Failures acquiring or releasing the instance lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another run appears to be live; fatal at startup, no retry.
    #[error(
        "lock file {0:?} already exists; if you are sure no other instance is running, delete it manually"
    )]
    AlreadyRunning(PathBuf),
    /// The marker could not be written or removed.
    #[error("cannot manage lock file: {0}")]
    Io(#[from] io::Error),
}

/// Exclusive ownership of the single-instance invariant for the process
/// lifetime.
///
/// Holding the handle is what makes the rate-limit accounting and the
/// no-duplicate-upload guarantee valid; the marker is removed on drop so
/// every exit path releases it.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    released: bool,
}

impl InstanceLock {
    /// Acquire the lock by creating a pid-tagged marker at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::AlreadyRunning`] when a marker already exists,
    /// without touching any other state.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        if path.exists() {
            error!("Lock file {} already exists; exiting", path.display());
            return Err(LockError::AlreadyRunning(path.to_path_buf()));
        }
        fs::write(path, std::process::id().to_string())?;
        debug!("Acquired instance lock at {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            released: false,
        })
    }

    /// Release the lock explicitly, surfacing removal failures.
    ///
    /// # Errors
    ///
    /// Returns an error when the marker cannot be removed; the operator
    /// must then delete it by hand before the next run.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        debug!("Removing {}", self.path.display());
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if !self.released {
            debug!("Removing {}", self.path.display());
            if let Err(e) = fs::remove_file(&self.path) {
                error!("Failed to remove lock file {}: {e}", self.path.display());
            }
        }
    }
}
