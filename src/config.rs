//! User configuration persisted at `{install_root}/user_config.json`.
//!
//! Written once on first install with pre-filled defaults. Subsequent installs
//! never overwrite it, so user edits (poll interval, folder moves) survive
//! re-installation. Uninstall removes it along with the rest of the tree.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::detect;
use crate::error::SetupError;

/// Default remote polling interval in seconds (5 minutes).
pub const DEFAULT_POLL_INTERVAL: u64 = 300;

/// Microsoft identity defaults: the "consumers" tenant covers personal
/// accounts, which is what the stock OAuth app registration targets.
pub const DEFAULT_TENANT_ID: &str = "consumers";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub client_id: String,
    pub tenant_id: String,
    pub local_folder: PathBuf,
    pub poll_interval: u64,
}

impl UserConfig {
    /// Defaults for a fresh install rooted at `install_root`.
    pub fn defaults_for(install_root: &Path) -> Self {
        Self {
            client_id: String::new(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            local_folder: install_root.join("sync_folder"),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Ensure `user_config.json` exists under `install_root`.
///
/// Returns `true` if an existing config was preserved untouched, `false` if
/// the defaults were written. Existing files are never rewritten, even when
/// they fail to parse: a malformed config is the user's to fix, not ours to
/// clobber.
pub fn ensure(install_root: &Path, defaults: &UserConfig) -> Result<bool, SetupError> {
    let path = detect::config_path(install_root);
    if path.is_file() {
        return Ok(true);
    }

    let body = serde_json::to_string_pretty(defaults)
        .context("serializing default user config")
        .map_err(SetupError::Config)?;
    fs::write(&path, body)
        .with_context(|| format!("writing {}", path.display()))
        .map_err(SetupError::Config)?;
    log::info!("Wrote default configuration to {}", path.display());
    Ok(false)
}

/// Load the config for display/inspection. Missing file is not an error here;
/// callers that require one probe `InstallationState` first.
pub fn load(install_root: &Path) -> Result<Option<UserConfig>, SetupError> {
    let path = detect::config_path(install_root);
    if !path.is_file() {
        return Ok(None);
    }
    let body = fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))
        .map_err(SetupError::Config)?;
    let cfg = serde_json::from_str(&body)
        .with_context(|| format!("parsing {}", path.display()))
        .map_err(SetupError::Config)?;
    Ok(Some(cfg))
}
