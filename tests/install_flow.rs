//! End-to-end reconciliation scenarios driven through in-memory collaborator
//! fakes, with real filesystem state in tempdir sandboxes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};

use autosyncctl::autostart::{AutoStart, LaunchCommand};
use autosyncctl::config::UserConfig;
use autosyncctl::detect;
use autosyncctl::error::SetupError;
use autosyncctl::fetch::SourceFetch;
use autosyncctl::health::LivenessProbe;
use autosyncctl::manager::{InstallManager, Prerequisite, STARTUP_PROBE_ATTEMPTS};
use autosyncctl::process::ProcessControl;
use autosyncctl::provision::Provisioner;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeFetch {
    fail: bool,
    calls: AtomicU32,
}

impl SourceFetch for &FakeFetch {
    fn fetch_or_update(&self, local_path: &Path) -> Result<()> {
        if self.fail {
            bail!("remote unreachable");
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        fs::create_dir_all(local_path)?;
        fs::write(local_path.join("app.py"), "# AutoSync entry point\n")?;
        fs::write(local_path.join("requirements.txt"), "flask==3.0.0\n")?;
        Ok(())
    }
}

#[derive(Default)]
struct FakeProvisioner {
    env_creates: AtomicU32,
    dep_installs: AtomicU32,
}

impl Provisioner for &FakeProvisioner {
    fn ensure_runtime_env(&self, install_root: &Path) -> Result<()> {
        let python = detect::venv_python(install_root);
        if !python.is_file() {
            fs::create_dir_all(python.parent().expect("venv bin dir"))?;
            fs::write(&python, "")?;
            self.env_creates.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn install_dependencies(&self, install_root: &Path) -> Result<()> {
        if !detect::requirements_path(install_root).is_file() {
            bail!("requirements.txt missing");
        }
        self.dep_installs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct FakeProcess {
    started: Mutex<Vec<PathBuf>>,
    running: Mutex<Vec<u32>>,
    next_pid: AtomicU32,
}

impl FakeProcess {
    fn with_running(pids: &[u32]) -> Self {
        let fake = Self::default();
        *fake.running.lock().expect("running") = pids.to_vec();
        fake
    }
}

impl ProcessControl for &FakeProcess {
    fn start_background(&self, program: &Path, _args: &[String], _workdir: &Path) -> Result<u32> {
        self.started
            .lock()
            .expect("started")
            .push(program.to_path_buf());
        let pid = 1000 + self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.running.lock().expect("running").push(pid);
        Ok(pid)
    }

    fn find_running_under(&self, _root: &Path) -> Result<Vec<u32>> {
        Ok(self.running.lock().expect("running").clone())
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        self.running.lock().expect("running").retain(|p| *p != pid);
        Ok(())
    }
}

struct FakeProbe {
    /// Probe reports healthy from this attempt on; 0 means never.
    healthy_after: u32,
    calls: AtomicU32,
}

impl FakeProbe {
    fn healthy() -> Self {
        Self {
            healthy_after: 1,
            calls: AtomicU32::new(0),
        }
    }

    fn never_healthy() -> Self {
        Self {
            healthy_after: 0,
            calls: AtomicU32::new(0),
        }
    }
}

impl LivenessProbe for &FakeProbe {
    async fn probe(&self) -> bool {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.healthy_after != 0 && call >= self.healthy_after
    }
}

#[derive(Default)]
struct FakeAutoStart {
    entries: Mutex<HashMap<String, String>>,
    register_calls: AtomicU32,
    unregister_calls: AtomicU32,
}

impl FakeAutoStart {
    fn with_entry(id: &str, command: &str) -> Self {
        let fake = Self::default();
        fake.entries
            .lock()
            .expect("entries")
            .insert(id.to_string(), command.to_string());
        fake
    }

    fn command_for(&self, id: &str) -> Option<String> {
        self.entries.lock().expect("entries").get(id).cloned()
    }

    fn entry_count(&self) -> usize {
        self.entries.lock().expect("entries").len()
    }
}

impl AutoStart for &FakeAutoStart {
    fn is_registered(&self, id: &str) -> Result<bool> {
        Ok(self.entries.lock().expect("entries").contains_key(id))
    }

    fn register(&self, id: &str, command: &LaunchCommand) -> Result<()> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        let line = format!(
            "{} {}",
            command.program.display(),
            command.args.join(" ")
        );
        self.entries
            .lock()
            .expect("entries")
            .insert(id.to_string(), line);
        Ok(())
    }

    fn unregister(&self, id: &str) -> Result<()> {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().expect("entries").remove(id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Sandbox {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    lock_dir: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("AutoSync");
        let lock_dir = tmp.path().join("locks");
        fs::create_dir_all(&lock_dir).expect("lock dir");
        Self {
            _tmp: tmp,
            root,
            lock_dir,
        }
    }

    fn manager<'a>(
        &self,
        fetch: &'a FakeFetch,
        provisioner: &'a FakeProvisioner,
        process: &'a FakeProcess,
        probe: &'a FakeProbe,
        autostart: &'a FakeAutoStart,
    ) -> InstallManager<&'a FakeFetch, &'a FakeProvisioner, &'a FakeProcess, &'a FakeProbe, &'a FakeAutoStart>
    {
        InstallManager::new(
            self.root.clone(),
            fetch,
            provisioner,
            process,
            probe,
            autostart,
        )
        .with_lock_dir(self.lock_dir.clone())
        .with_probe_interval(Duration::from_millis(1))
    }

    fn defaults(&self) -> UserConfig {
        UserConfig::defaults_for(&self.root)
    }
}

const LABEL: &str = "com.riskarena.autosync";

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fresh_machine_install_creates_full_state() {
    let sandbox = Sandbox::new();
    let fetch = FakeFetch::default();
    let provisioner = FakeProvisioner::default();
    let process = FakeProcess::default();
    let probe = FakeProbe::healthy();
    let autostart = FakeAutoStart::default();
    let manager = sandbox.manager(&fetch, &provisioner, &process, &probe, &autostart);

    let outcome = manager.install(&sandbox.defaults()).await.expect("install");

    assert!(!outcome.config_preserved);
    assert!(outcome.auto_start_registered);
    assert!(!outcome.startup_not_confirmed);
    assert!(outcome.warnings.is_empty());

    let state = detect::probe(&sandbox.root);
    assert!(state.is_present);
    assert!(state.has_virtual_env);
    assert!(state.has_config);

    assert_eq!(autostart.entry_count(), 1);
    let command = autostart.command_for(LABEL).expect("entry");
    assert!(command.contains(&sandbox.root.display().to_string()));
    assert_eq!(process.started.lock().expect("started").len(), 1);
}

#[tokio::test]
async fn second_install_preserves_config_and_keeps_one_registration() {
    let sandbox = Sandbox::new();
    let fetch = FakeFetch::default();
    let provisioner = FakeProvisioner::default();
    let process = FakeProcess::default();
    let probe = FakeProbe::healthy();
    let autostart = FakeAutoStart::default();
    let manager = sandbox.manager(&fetch, &provisioner, &process, &probe, &autostart);

    let first = manager.install(&sandbox.defaults()).await.expect("install 1");
    assert!(!first.config_preserved);

    let second = manager.install(&sandbox.defaults()).await.expect("install 2");
    assert!(second.config_preserved);

    assert_eq!(autostart.entry_count(), 1);
    // Environment created once; dependency install re-run every time.
    assert_eq!(provisioner.env_creates.load(Ordering::SeqCst), 1);
    assert_eq!(provisioner.dep_installs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn user_edited_poll_interval_survives_reinstall() {
    let sandbox = Sandbox::new();
    fs::create_dir_all(&sandbox.root).expect("mkdir");
    let mut edited = sandbox.defaults();
    edited.poll_interval = 600;
    fs::write(
        detect::config_path(&sandbox.root),
        serde_json::to_string_pretty(&edited).expect("serialize"),
    )
    .expect("seed config");

    let fetch = FakeFetch::default();
    let provisioner = FakeProvisioner::default();
    let process = FakeProcess::default();
    let probe = FakeProbe::healthy();
    let autostart = FakeAutoStart::default();
    let manager = sandbox.manager(&fetch, &provisioner, &process, &probe, &autostart);

    let outcome = manager.install(&sandbox.defaults()).await.expect("install");
    assert!(outcome.config_preserved);

    let loaded = autosyncctl::config::load(&sandbox.root)
        .expect("load")
        .expect("config present");
    assert_eq!(loaded.poll_interval, 600);
}

#[tokio::test]
async fn stale_registration_is_repointed_to_current_path() {
    let sandbox = Sandbox::new();
    let fetch = FakeFetch::default();
    let provisioner = FakeProvisioner::default();
    let process = FakeProcess::default();
    let probe = FakeProbe::healthy();
    let autostart = FakeAutoStart::with_entry(LABEL, "/old/moved/venv/bin/python /old/moved/app.py");
    let manager = sandbox.manager(&fetch, &provisioner, &process, &probe, &autostart);

    manager.install(&sandbox.defaults()).await.expect("install");

    assert_eq!(autostart.entry_count(), 1);
    let command = autostart.command_for(LABEL).expect("entry");
    assert!(!command.contains("/old/moved"));
    assert!(command.contains(&sandbox.root.display().to_string()));
    assert!(autostart.unregister_calls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn probe_timeout_is_bounded_and_nonfatal() {
    let sandbox = Sandbox::new();
    let fetch = FakeFetch::default();
    let provisioner = FakeProvisioner::default();
    let process = FakeProcess::default();
    let probe = FakeProbe::never_healthy();
    let autostart = FakeAutoStart::default();
    let manager = sandbox.manager(&fetch, &provisioner, &process, &probe, &autostart);

    let outcome = manager.install(&sandbox.defaults()).await.expect("install");

    assert!(outcome.startup_not_confirmed);
    assert!(outcome.auto_start_registered);
    assert_eq!(probe.calls.load(Ordering::SeqCst), STARTUP_PROBE_ATTEMPTS);
}

#[tokio::test]
async fn no_start_skips_launch_and_probe() {
    let sandbox = Sandbox::new();
    let fetch = FakeFetch::default();
    let provisioner = FakeProvisioner::default();
    let process = FakeProcess::default();
    let probe = FakeProbe::healthy();
    let autostart = FakeAutoStart::default();
    let manager = sandbox
        .manager(&fetch, &provisioner, &process, &probe, &autostart)
        .without_start();

    let outcome = manager.install(&sandbox.defaults()).await.expect("install");

    assert!(!outcome.startup_not_confirmed);
    assert!(outcome.auto_start_registered);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    assert!(process.started.lock().expect("started").is_empty());
}

#[tokio::test]
async fn fetch_failure_aborts_before_any_registration() {
    let sandbox = Sandbox::new();
    let fetch = FakeFetch {
        fail: true,
        ..FakeFetch::default()
    };
    let provisioner = FakeProvisioner::default();
    let process = FakeProcess::default();
    let probe = FakeProbe::healthy();
    let autostart = FakeAutoStart::default();
    let manager = sandbox.manager(&fetch, &provisioner, &process, &probe, &autostart);

    let err = manager
        .install(&sandbox.defaults())
        .await
        .expect_err("fetch should fail");
    assert!(matches!(err, SetupError::Fetch(_)));

    assert_eq!(autostart.register_calls.load(Ordering::SeqCst), 0);
    assert!(!detect::config_path(&sandbox.root).exists());
}

#[tokio::test]
async fn missing_prerequisite_aborts_with_remediation_and_no_mutation() {
    let sandbox = Sandbox::new();
    let fetch = FakeFetch::default();
    let provisioner = FakeProvisioner::default();
    let process = FakeProcess::default();
    let probe = FakeProbe::healthy();
    let autostart = FakeAutoStart::default();
    let manager = sandbox
        .manager(&fetch, &provisioner, &process, &probe, &autostart)
        .with_prerequisites(vec![Prerequisite {
            tool: "autosync-toolchain-that-does-not-exist".to_string(),
            remediation: "install the sync toolchain and re-run".to_string(),
        }]);

    let err = manager
        .install(&sandbox.defaults())
        .await
        .expect_err("missing tool should abort");
    assert!(matches!(err, SetupError::PrerequisiteMissing { .. }));
    assert!(err.to_string().contains("autosync-toolchain-that-does-not-exist"));
    assert!(err.to_string().contains("install the sync toolchain and re-run"));

    // Nothing mutated: no tree, no fetch, no registration attempt.
    assert!(!sandbox.root.exists());
    assert_eq!(fetch.calls.load(Ordering::SeqCst), 0);
    assert_eq!(autostart.register_calls.load(Ordering::SeqCst), 0);
    assert_eq!(autostart.entry_count(), 0);
}

#[tokio::test]
async fn uninstall_reverses_install_and_is_idempotent() {
    let sandbox = Sandbox::new();
    let fetch = FakeFetch::default();
    let provisioner = FakeProvisioner::default();
    let process = FakeProcess::default();
    let probe = FakeProbe::healthy();
    let autostart = FakeAutoStart::default();
    let manager = sandbox.manager(&fetch, &provisioner, &process, &probe, &autostart);

    manager.install(&sandbox.defaults()).await.expect("install");

    let first = manager.uninstall().expect("uninstall 1");
    assert!(first.unregistered);
    assert!(first.removed_tree);
    assert_eq!(first.terminated, 1); // the instance install started
    assert!(!sandbox.root.exists());
    assert_eq!(autostart.entry_count(), 0);

    let second = manager.uninstall().expect("uninstall 2");
    assert!(!second.unregistered);
    assert!(!second.removed_tree);
    assert_eq!(second.terminated, 0);
}

#[tokio::test]
async fn uninstall_terminates_running_instances() {
    let sandbox = Sandbox::new();
    fs::create_dir_all(&sandbox.root).expect("mkdir");
    let fetch = FakeFetch::default();
    let provisioner = FakeProvisioner::default();
    let process = FakeProcess::with_running(&[4242, 4243]);
    let probe = FakeProbe::healthy();
    let autostart = FakeAutoStart::default();
    let manager = sandbox.manager(&fetch, &provisioner, &process, &probe, &autostart);

    let outcome = manager.uninstall().expect("uninstall");

    assert_eq!(outcome.terminated, 2);
    assert!(process.running.lock().expect("running").is_empty());
}

#[tokio::test]
async fn uninstall_never_touches_paths_outside_install_root() {
    let sandbox = Sandbox::new();
    let fetch = FakeFetch::default();
    let provisioner = FakeProvisioner::default();
    let process = FakeProcess::default();
    let probe = FakeProbe::healthy();
    let autostart = FakeAutoStart::default();
    let manager = sandbox.manager(&fetch, &provisioner, &process, &probe, &autostart);

    // Generate an arbitrary file tree next to (not under) the install root,
    // standing in for the user's synced files and unrelated data.
    let outside = sandbox._tmp.path().join("outside");
    let mut created = Vec::new();
    for i in 0..20 {
        let mut dir = outside.clone();
        for _ in 0..fastrand::usize(0..4) {
            dir = dir.join(format!("d{}", fastrand::u32(0..1000)));
        }
        fs::create_dir_all(&dir).expect("mkdir outside");
        let file = dir.join(format!("f{i}.dat"));
        fs::write(&file, vec![fastrand::u8(..); 16]).expect("write outside");
        created.push(file);
    }

    manager.install(&sandbox.defaults()).await.expect("install");
    manager.uninstall().expect("uninstall");

    assert!(!sandbox.root.exists());
    for file in &created {
        assert!(file.is_file(), "outside path removed: {}", file.display());
    }
}

#[tokio::test]
async fn concurrent_operations_are_mutually_excluded() {
    let sandbox = Sandbox::new();
    let fetch = FakeFetch::default();
    let provisioner = FakeProvisioner::default();
    let process = FakeProcess::default();
    let probe = FakeProbe::healthy();
    let autostart = FakeAutoStart::default();
    let manager = sandbox.manager(&fetch, &provisioner, &process, &probe, &autostart);

    let held = autosyncctl::lock::OpLock::acquire_in(&sandbox.lock_dir).expect("hold lock");

    let err = manager
        .install(&sandbox.defaults())
        .await
        .expect_err("install should be locked out");
    assert!(matches!(err, SetupError::Busy(_)));

    let err = manager.uninstall().expect_err("uninstall should be locked out");
    assert!(matches!(err, SetupError::Busy(_)));

    drop(held);
    manager.install(&sandbox.defaults()).await.expect("install after release");
}
