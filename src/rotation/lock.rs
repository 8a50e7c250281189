// src/rotation/lock.rs
//! Single-writer guard for rotation runs
//!
//! Two rotations over the same table would race their commits on the
//! same rows. The lock is a file created with `create_new`, so only one
//! process can hold it; it is removed when the guard drops.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        Self::acquire_with(path.as_ref(), |file| {
            writeln!(
                file,
                "pid={} acquired_at={}",
                std::process::id(),
                Utc::now().to_rfc3339()
            )
        })
    }

    /// Create the lock file, then let `stamp` write its contents. The
    /// guard exists before `stamp` runs, so a failed write still removes
    /// the file.
    fn acquire_with(
        path: &Path,
        stamp: impl FnOnce(&mut File) -> std::io::Result<()>,
    ) -> Result<Self> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(CoreError::RunLocked(path.display().to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        let lock = Self {
            path: path.to_path_buf(),
        };

        stamp(&mut file)?;
        debug!(path = %path.display(), "rotation run lock acquired");
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), %err, "failed to remove rotation run lock");
        }
    }
}
