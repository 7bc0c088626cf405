//! Installation state detection and canonical install-tree paths.
//!
//! The state is probed fresh from the filesystem at the start of every
//! operation and never cached across runs, so there is no hidden staleness
//! between what the manager believes and what is on disk.

use std::path::{Path, PathBuf};

/// Stable per-user identifier for the AutoSync instance. Auto-start
/// registration and the operation lock are both keyed by this.
pub const APP_LABEL: &str = "com.riskarena.autosync";

/// Display name used for artifacts that want a human-readable name.
pub const APP_NAME: &str = "AutoSync";

/// Observed facts about the install tree. Plain data, no behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationState {
    pub install_root: PathBuf,
    pub is_present: bool,
    pub has_virtual_env: bool,
    pub has_config: bool,
}

/// Probe the install tree rooted at `install_root`.
pub fn probe(install_root: &Path) -> InstallationState {
    InstallationState {
        install_root: install_root.to_path_buf(),
        is_present: install_root.is_dir(),
        has_virtual_env: venv_python(install_root).is_file(),
        has_config: config_path(install_root).is_file(),
    }
}

/// Default install location: the per-user data directory, falling back to a
/// dot-directory under $HOME when the platform dirs are unavailable.
pub fn default_install_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_NAME))
        .or_else(|| dirs::home_dir().map(|h| h.join(".autosync")))
        .unwrap_or_else(|| std::env::temp_dir().join(APP_NAME))
}

pub fn config_path(install_root: &Path) -> PathBuf {
    install_root.join("user_config.json")
}

pub fn app_entry(install_root: &Path) -> PathBuf {
    install_root.join("app.py")
}

pub fn requirements_path(install_root: &Path) -> PathBuf {
    install_root.join("requirements.txt")
}

pub fn venv_dir(install_root: &Path) -> PathBuf {
    install_root.join("venv")
}

/// Interpreter inside the virtualenv. On Windows this is `pythonw.exe` so the
/// app runs without a console window.
pub fn venv_python(install_root: &Path) -> PathBuf {
    #[cfg(windows)]
    {
        venv_dir(install_root).join("Scripts").join("pythonw.exe")
    }

    #[cfg(not(windows))]
    {
        venv_dir(install_root).join("bin").join("python")
    }
}
