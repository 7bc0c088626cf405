//! Process control: background launch, lookup by install root, termination.

use std::fs::OpenOptions;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use log::info;

/// Minimal process-control surface the manager needs.
pub trait ProcessControl {
    /// Start `program args…` detached from the current terminal with
    /// `workdir` as its working directory. Returns the child pid.
    fn start_background(&self, program: &Path, args: &[String], workdir: &Path) -> Result<u32>;

    /// Pids of processes whose executable path is rooted under `root`.
    /// Never includes the calling process.
    fn find_running_under(&self, root: &Path) -> Result<Vec<u32>>;

    /// Ask the process to shut down (SIGTERM on unix, forced kill on
    /// Windows where there is no polite equivalent for console-less apps).
    fn terminate(&self, pid: u32) -> Result<()>;
}

/// Host implementation backed by OS process tools.
pub struct HostProcessControl;

impl ProcessControl for HostProcessControl {
    fn start_background(&self, program: &Path, args: &[String], workdir: &Path) -> Result<u32> {
        // Same log files the auto-start artifacts point at, so manual starts
        // and login starts land in one place.
        let stdout = OpenOptions::new()
            .create(true)
            .append(true)
            .open(workdir.join("autosync_stdout.log"))
            .context("opening stdout log")?;
        let stderr = OpenOptions::new()
            .create(true)
            .append(true)
            .open(workdir.join("autosync_stderr.log"))
            .context("opening stderr log")?;

        let child = Command::new(program)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .with_context(|| format!("spawning {}", program.display()))?;

        let pid = child.id();
        info!("Started {} (pid {pid})", program.display());
        Ok(pid)
    }

    fn find_running_under(&self, root: &Path) -> Result<Vec<u32>> {
        // Candidate discovery by command-line match over-selects: any process
        // that merely mentions the root in its argv would match, including
        // this very process when the root was passed as a CLI flag. Each
        // candidate's executable path is verified before it is returned.
        let own_pid = std::process::id();

        #[cfg(unix)]
        {
            let output = Command::new("pgrep")
                .arg("-f")
                .arg(root)
                .output()
                .context("Failed to execute pgrep")?;
            // pgrep exits 1 when nothing matches; only other codes are errors.
            if !output.status.success() && output.status.code() != Some(1) {
                bail!(
                    "pgrep failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            let mut pids = Vec::new();
            for pid in String::from_utf8_lossy(&output.stdout)
                .lines()
                .filter_map(|l| l.trim().parse::<u32>().ok())
            {
                if pid != own_pid && executable_under_root(pid, root) {
                    pids.push(pid);
                }
            }
            Ok(pids)
        }

        #[cfg(windows)]
        {
            let filter = format!(
                "ExecutablePath like '{}%'",
                root.display().to_string().replace('\\', "\\\\")
            );
            let output = Command::new("wmic")
                .args(["process", "where", &filter, "get", "ProcessId"])
                .output()
                .context("Failed to execute wmic")?;
            Ok(String::from_utf8_lossy(&output.stdout)
                .lines()
                .filter_map(|l| l.trim().parse().ok())
                .filter(|pid| *pid != own_pid)
                .collect())
        }
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;

            kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
                .with_context(|| format!("sending SIGTERM to pid {pid}"))?;
            Ok(())
        }

        #[cfg(windows)]
        {
            let output = Command::new("taskkill")
                .args(["/PID", &pid.to_string(), "/F"])
                .output()
                .context("Failed to execute taskkill")?;
            if !output.status.success() {
                bail!(
                    "taskkill failed for pid {pid}: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Ok(())
        }
    }
}

/// True when `pid`'s argv[0] is a path under `root`.
///
/// argv[0] rather than the resolved executable link: a virtualenv
/// interpreter is typically a symlink to the system Python, so the resolved
/// path would point outside the root for exactly the processes we own.
#[cfg(unix)]
fn executable_under_root(pid: u32, root: &Path) -> bool {
    let output = match Command::new("ps")
        .args(["-o", "args=", "-p", &pid.to_string()])
        .output()
    {
        Ok(output) => output,
        Err(_) => return false,
    };
    if !output.status.success() {
        return false; // process already gone
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().next())
        .is_some_and(|argv0| Path::new(argv0).starts_with(root))
}
