//! Source-fetch collaborator: brings the install root up to date with the
//! AutoSync git remote.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use log::info;

/// Default upstream for the AutoSync application source.
pub const DEFAULT_REMOTE: &str = "https://github.com/riskarena/autosync.git";

/// Brings a local tree to match a remote ref's latest content.
pub trait SourceFetch {
    fn fetch_or_update(&self, local_path: &Path) -> Result<()>;
}

/// Git-backed fetcher: clone on first install, fast-forward pull afterwards.
pub struct GitFetch {
    remote: String,
}

impl GitFetch {
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
        }
    }
}

impl SourceFetch for GitFetch {
    fn fetch_or_update(&self, local_path: &Path) -> Result<()> {
        if local_path.join(".git").is_dir() {
            info!("Updating existing checkout at {}", local_path.display());
            let output = Command::new("git")
                .args(["-C"])
                .arg(local_path)
                .args(["pull", "--ff-only"])
                .output()
                .context("Failed to execute git pull")?;
            if !output.status.success() {
                bail!(
                    "git pull failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
        } else {
            info!("Cloning {} into {}", self.remote, local_path.display());
            if let Some(parent) = local_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let output = Command::new("git")
                .arg("clone")
                .arg(&self.remote)
                .arg(local_path)
                .output()
                .context("Failed to execute git clone")?;
            if !output.status.success() {
                bail!(
                    "git clone failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
        }
        Ok(())
    }
}
