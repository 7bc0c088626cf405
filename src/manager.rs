//! Install/uninstall reconciliation.
//!
//! The manager probes the machine's current state fresh on every call and
//! applies the minimal set of changes to converge on the desired state:
//! installed + configured + registered for auto-start + running, or fully
//! absent. Both operations are idempotent and safe to invoke from any state.
//!
//! Failure policy: prerequisites, fetch, and provisioning abort the install
//! with the underlying error. Config, registration, and startup are
//! best-effort: once the auto-start entry exists the system self-heals at
//! the next login, so their failures are downgraded to warnings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};

use crate::autostart::{AutoStart, LaunchCommand, PlatformAutoStart};
use crate::config::{self, UserConfig};
use crate::detect::{self, APP_LABEL, InstallationState};
use crate::error::SetupError;
use crate::fetch::{GitFetch, SourceFetch};
use crate::health::{HttpProbe, LivenessProbe};
use crate::lock::{OpLock, default_lock_dir};
use crate::process::{HostProcessControl, ProcessControl};
use crate::provision::{Provisioner, VenvProvisioner, host_python};

/// Liveness probe bounds: up to 15 attempts at 1-second spacing. A timeout is
/// non-fatal; auto-start guarantees eventual startup regardless.
pub const STARTUP_PROBE_ATTEMPTS: u32 = 15;
pub const STARTUP_PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Host tool that must be on PATH before install mutates anything.
#[derive(Debug, Clone)]
pub struct Prerequisite {
    pub tool: String,
    pub remediation: String,
}

/// What install did (or preserved).
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub install_root: PathBuf,
    pub config_preserved: bool,
    pub auto_start_registered: bool,
    pub startup_not_confirmed: bool,
    pub warnings: Vec<String>,
}

/// What uninstall removed vs. found already absent.
#[derive(Debug, Clone)]
pub struct UninstallOutcome {
    pub unregistered: bool,
    pub terminated: usize,
    pub removed_tree: bool,
    pub warnings: Vec<String>,
}

/// Snapshot for the `status` subcommand.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub state: InstallationState,
    pub auto_start_registered: bool,
    pub running_pids: Vec<u32>,
}

/// The reconciliation core, generic over its collaborators so tests can
/// drive it with in-memory fakes.
pub struct InstallManager<F, P, C, L, R> {
    install_root: PathBuf,
    fetch: F,
    provisioner: P,
    process: C,
    probe: L,
    autostart: R,
    prerequisites: Vec<Prerequisite>,
    start_app: bool,
    probe_attempts: u32,
    probe_interval: Duration,
    lock_dir: PathBuf,
}

impl InstallManager<GitFetch, VenvProvisioner, HostProcessControl, HttpProbe, PlatformAutoStart> {
    /// Manager wired to the real host: git, python venv, OS process tools,
    /// HTTP health probe, and the platform auto-start registry.
    pub fn host(install_root: PathBuf, remote: String) -> Self {
        let python = host_python();
        Self::new(
            install_root,
            GitFetch::new(remote),
            VenvProvisioner::new(),
            HostProcessControl,
            HttpProbe::new(),
            PlatformAutoStart,
        )
        .with_prerequisites(vec![
            Prerequisite {
                tool: "git".to_string(),
                remediation: "install git (https://git-scm.com/downloads) and re-run".to_string(),
            },
            Prerequisite {
                tool: python.to_string(),
                remediation: format!("install Python 3 so '{python}' is on PATH and re-run"),
            },
        ])
    }
}

impl<F, P, C, L, R> InstallManager<F, P, C, L, R>
where
    F: SourceFetch,
    P: Provisioner,
    C: ProcessControl,
    L: LivenessProbe,
    R: AutoStart,
{
    pub fn new(
        install_root: PathBuf,
        fetch: F,
        provisioner: P,
        process: C,
        probe: L,
        autostart: R,
    ) -> Self {
        Self {
            install_root,
            fetch,
            provisioner,
            process,
            probe,
            autostart,
            prerequisites: Vec::new(),
            start_app: true,
            probe_attempts: STARTUP_PROBE_ATTEMPTS,
            probe_interval: STARTUP_PROBE_INTERVAL,
            lock_dir: default_lock_dir(),
        }
    }

    pub fn with_prerequisites(mut self, prerequisites: Vec<Prerequisite>) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    /// Skip the start-and-probe step (auto-start registration still happens).
    pub fn without_start(mut self) -> Self {
        self.start_app = false;
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn with_lock_dir(mut self, dir: PathBuf) -> Self {
        self.lock_dir = dir;
        self
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Converge on "installed, configured, registered, running".
    pub async fn install(&self, defaults: &UserConfig) -> Result<InstallOutcome, SetupError> {
        let _lock = OpLock::acquire_in(&self.lock_dir)?;
        self.check_prerequisites()?;

        let state = detect::probe(&self.install_root);
        info!(
            "Install state: present={} venv={} config={}",
            state.is_present, state.has_virtual_env, state.has_config
        );

        // Fatal phase: without a valid tree and environment there is nothing
        // worth registering.
        self.fetch
            .fetch_or_update(&self.install_root)
            .map_err(SetupError::Fetch)?;
        self.provisioner
            .ensure_runtime_env(&self.install_root)
            .map_err(SetupError::Provisioning)?;
        self.provisioner
            .install_dependencies(&self.install_root)
            .map_err(SetupError::Provisioning)?;

        let mut warnings = Vec::new();

        let config_preserved = match config::ensure(&self.install_root, defaults) {
            Ok(preserved) => preserved,
            Err(e) => {
                warn!("{e}");
                warnings.push(e.to_string());
                false
            }
        };

        let auto_start_registered = self.reregister(&mut warnings);

        let startup_not_confirmed = if self.start_app {
            !self.start_and_confirm(&mut warnings).await
        } else {
            info!("Skipping app start (--no-start)");
            false
        };

        Ok(InstallOutcome {
            install_root: self.install_root.clone(),
            config_preserved,
            auto_start_registered,
            startup_not_confirmed,
            warnings,
        })
    }

    /// Converge on "fully absent". Everything outside the install root is
    /// left untouched, including the synced-files folder when the user
    /// pointed it elsewhere.
    pub fn uninstall(&self) -> Result<UninstallOutcome, SetupError> {
        let _lock = OpLock::acquire_in(&self.lock_dir)?;

        let mut warnings = Vec::new();

        let was_registered = self.autostart.is_registered(APP_LABEL).unwrap_or(false);
        let unregistered = match self.autostart.unregister(APP_LABEL) {
            Ok(()) => was_registered,
            Err(e) => {
                let msg = SetupError::Registration(e).to_string();
                warn!("{msg}");
                warnings.push(msg);
                false
            }
        };
        if !was_registered {
            info!("Auto-start entry already absent");
        }

        // Best-effort: removing the tree below is the authoritative cleanup.
        let mut terminated = 0;
        match self.process.find_running_under(&self.install_root) {
            Ok(pids) => {
                for pid in pids {
                    match self.process.terminate(pid) {
                        Ok(()) => {
                            info!("Terminated pid {pid}");
                            terminated += 1;
                        }
                        Err(e) => {
                            let msg = format!("failed to terminate pid {pid}: {e:#}");
                            warn!("{msg}");
                            warnings.push(msg);
                        }
                    }
                }
            }
            Err(e) => {
                let msg = format!("failed to enumerate running instances: {e:#}");
                warn!("{msg}");
                warnings.push(msg);
            }
        }

        let state = detect::probe(&self.install_root);
        let removed_tree = if state.is_present {
            std::fs::remove_dir_all(&self.install_root).map_err(|source| SetupError::Removal {
                path: self.install_root.clone(),
                source,
            })?;
            info!("Removed install tree at {}", self.install_root.display());
            true
        } else {
            info!("Install tree already absent");
            false
        };

        Ok(UninstallOutcome {
            unregistered,
            terminated,
            removed_tree,
            warnings,
        })
    }

    /// Probe everything the `status` subcommand reports. Read-only.
    pub fn status(&self) -> StatusReport {
        let state = detect::probe(&self.install_root);
        let auto_start_registered = self.autostart.is_registered(APP_LABEL).unwrap_or(false);
        let running_pids = self
            .process
            .find_running_under(&self.install_root)
            .unwrap_or_default();
        StatusReport {
            state,
            auto_start_registered,
            running_pids,
        }
    }

    fn check_prerequisites(&self) -> Result<(), SetupError> {
        for prereq in &self.prerequisites {
            if which::which(&prereq.tool).is_err() {
                return Err(SetupError::PrerequisiteMissing {
                    tool: prereq.tool.clone(),
                    remediation: prereq.remediation.clone(),
                });
            }
        }
        Ok(())
    }

    /// Command line the auto-start entry and manual starts both use.
    fn launch_command(&self) -> LaunchCommand {
        LaunchCommand {
            program: detect::venv_python(&self.install_root),
            args: vec![
                detect::app_entry(&self.install_root)
                    .to_string_lossy()
                    .into_owned(),
            ],
            workdir: self.install_root.clone(),
        }
    }

    /// Drop any existing registration, then register the current command
    /// line. Unregister-first keeps the entry unique and repoints stale
    /// registrations left by an install at a previous path.
    fn reregister(&self, warnings: &mut Vec<String>) -> bool {
        match self.autostart.is_registered(APP_LABEL) {
            Ok(true) => {
                if let Err(e) = self.autostart.unregister(APP_LABEL) {
                    let msg = SetupError::Registration(e).to_string();
                    warn!("{msg}");
                    warnings.push(msg);
                }
            }
            Ok(false) => {}
            Err(e) => {
                let msg = SetupError::Registration(e).to_string();
                warn!("{msg}");
                warnings.push(msg);
            }
        }

        match self.autostart.register(APP_LABEL, &self.launch_command()) {
            Ok(()) => {
                info!("Auto-start registered as {APP_LABEL}");
                true
            }
            Err(e) => {
                let msg = SetupError::Registration(e).to_string();
                warn!("{msg}");
                warnings.push(msg);
                false
            }
        }
    }

    /// Start the app headless and wait for the health endpoint, bounded by
    /// the probe attempt budget. Returns whether startup was confirmed.
    async fn start_and_confirm(&self, warnings: &mut Vec<String>) -> bool {
        let command = self.launch_command();
        if let Err(e) = self.process.start_background(
            &command.program,
            &command.args,
            &command.workdir,
        ) {
            let msg = format!("failed to start app: {e:#}");
            warn!("{msg}");
            warnings.push(msg);
            return false;
        }

        for attempt in 1..=self.probe_attempts {
            if self.probe.probe().await {
                info!("App healthy after {attempt} probe(s)");
                return true;
            }
            if attempt < self.probe_attempts {
                tokio::time::sleep(self.probe_interval).await;
            }
        }

        warn!(
            "App did not report healthy within {} probes; auto-start will retry at next login",
            self.probe_attempts
        );
        false
    }
}
