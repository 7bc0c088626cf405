//! Single-operation mutual exclusion.
//!
//! The source of truth for install state lives on the filesystem and in the
//! auto-start registry, so two concurrent reconciliations could race each
//! other into duplicate registrations. A lock file keyed by the app label
//! keeps invocations single-shot: the second caller fails fast with
//! `SetupError::Busy` instead of blocking.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::detect::APP_LABEL;
use crate::error::SetupError;

/// Default lock location: a per-user directory, so one user's stale lock can
/// never wedge another user's install (a lock in the shared, sticky-bit /tmp
/// would be undeletable by anyone else).
pub fn default_lock_dir() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir)
}

/// Held for the duration of one install/uninstall; released on drop.
#[derive(Debug)]
pub struct OpLock {
    path: PathBuf,
}

impl OpLock {
    /// Acquire the lock by exclusively creating `{dir}/{label}.lock`.
    ///
    /// A crashed run leaves the file behind; the `Busy` error names the path
    /// so the user can remove it after confirming nothing is running.
    pub fn acquire_in(dir: &Path) -> Result<Self, SetupError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| {
                SetupError::Config(
                    anyhow::Error::new(e).context(format!("creating lock dir {}", dir.display())),
                )
            })?;

        let path = dir.join(format!("{APP_LABEL}.lock"));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                // Record the owning pid for post-mortem inspection.
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(SetupError::Busy(path))
            }
            Err(e) => Err(SetupError::Config(anyhow::Error::new(e).context(format!(
                "creating lock file {}",
                path.display()
            )))),
        }
    }
}

impl Drop for OpLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("Failed to remove lock file {}: {e}", self.path.display());
        }
    }
}
