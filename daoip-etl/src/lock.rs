//! Single-writer lock per grant system directory
//!
//! Writers hold a [`SystemLock`] for the duration of a batch so two runs
//! never rewrite the same files concurrently. The lock is a marker file
//! created with `create_new`, removed when the guard drops.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{EtlError, EtlResult};

/// Lock marker file name inside a system directory
pub const LOCK_FILE: &str = ".daoip.lock";

/// Held lock on a system directory
#[derive(Debug)]
pub struct SystemLock {
    path: PathBuf,
}

impl SystemLock {
    /// Acquire the lock, failing with [`EtlError::Locked`] if another run holds it
    pub fn acquire(system_dir: &Path) -> EtlResult<Self> {
        std::fs::create_dir_all(system_dir)
            .map_err(|e| daoip_common::Error::at_path(system_dir, e))?;

        let path = system_dir.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(EtlError::Locked(system_dir.to_path_buf()))
            }
            Err(e) => return Err(daoip_common::Error::at_path(&path, e).into()),
        };

        // Holder pid helps clear a stale lock by hand
        writeln!(file, "{}", std::process::id())?;
        debug!(path = %path.display(), "Acquired system lock");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SystemLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to release system lock");
        }
    }
}
