//! Error kinds for install/uninstall reconciliation.
//!
//! Fatal kinds abort the operation; `Registration` failures are downgraded to
//! warnings by the manager because the registration step is individually
//! retryable on the next run.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SetupError {
    /// A required host tool is not on PATH. Nothing has been mutated yet.
    #[error("required tool '{tool}' not found: {remediation}")]
    PrerequisiteMissing { tool: String, remediation: String },

    /// The source-fetch collaborator could not produce a valid tree.
    #[error("source fetch failed: {0:#}")]
    Fetch(anyhow::Error),

    /// Virtualenv creation or dependency installation failed.
    #[error("environment provisioning failed: {0:#}")]
    Provisioning(anyhow::Error),

    /// Auto-start registration failed (warning-level at the manager).
    #[error("auto-start registration failed: {0:#}")]
    Registration(anyhow::Error),

    /// The filesystem refused to remove part of the install tree.
    /// Partial removal is left in place; re-running uninstall completes it.
    #[error("failed to remove {}: {source}", path.display())]
    Removal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another install/uninstall holds the lock.
    #[error(
        "another install/uninstall is in progress (lock file {}); \
         delete it if no other instance is running",
        .0.display()
    )]
    Busy(PathBuf),

    /// user_config.json could not be written or parsed.
    #[error("config handling failed: {0:#}")]
    Config(anyhow::Error),
}
