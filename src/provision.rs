//! Environment-provisioning collaborator: virtualenv and pinned dependencies.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use log::info;

use crate::detect;

/// Provisions the isolated runtime environment for the app.
pub trait Provisioner {
    /// Create the runtime environment if absent. Must be a no-op when it
    /// already exists.
    fn ensure_runtime_env(&self, install_root: &Path) -> Result<()>;

    /// Install pinned dependencies. Always invoked, even on re-install, so
    /// drift in the environment is self-healing; expected to be cheap when
    /// everything is already satisfied.
    fn install_dependencies(&self, install_root: &Path) -> Result<()>;
}

/// Python virtualenv + pip implementation.
pub struct VenvProvisioner {
    python: String,
}

impl VenvProvisioner {
    pub fn new() -> Self {
        Self {
            python: host_python().to_string(),
        }
    }
}

impl Default for VenvProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

/// Interpreter name used to seed the virtualenv.
pub fn host_python() -> &'static str {
    if cfg!(windows) { "python" } else { "python3" }
}

impl Provisioner for VenvProvisioner {
    fn ensure_runtime_env(&self, install_root: &Path) -> Result<()> {
        let venv = detect::venv_dir(install_root);
        if detect::venv_python(install_root).is_file() {
            info!("Virtualenv already present at {}", venv.display());
            return Ok(());
        }

        info!("Creating virtualenv at {}", venv.display());
        let output = Command::new(&self.python)
            .args(["-m", "venv"])
            .arg(&venv)
            .output()
            .with_context(|| format!("Failed to execute {} -m venv", self.python))?;
        if !output.status.success() {
            bail!(
                "venv creation failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    fn install_dependencies(&self, install_root: &Path) -> Result<()> {
        let requirements = detect::requirements_path(install_root);
        if !requirements.is_file() {
            bail!("requirements manifest not found at {}", requirements.display());
        }

        info!("Installing dependencies from {}", requirements.display());
        let output = Command::new(detect::venv_python(install_root))
            .args(["-m", "pip", "install", "-r"])
            .arg(&requirements)
            .current_dir(install_root)
            .output()
            .context("Failed to execute pip install")?;
        if !output.status.success() {
            bail!(
                "pip install failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}
