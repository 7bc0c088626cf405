//! macOS auto-start via a per-user LaunchAgent (launchctl).

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result, bail};
use log::{info, warn};
use plist::Value;

use super::LaunchCommand;

fn agent_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|h| h.join("Library").join("LaunchAgents"))
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))
}

fn plist_path(id: &str) -> Result<PathBuf> {
    Ok(agent_dir()?.join(format!("{id}.plist")))
}

pub fn is_registered(id: &str) -> Result<bool> {
    Ok(plist_path(id)?.is_file())
}

pub fn register(id: &str, command: &LaunchCommand) -> Result<()> {
    let dir = agent_dir()?;
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let path = plist_path(id)?;
    let body = generate_plist(id, command)?;
    std::fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;

    // Load immediately; RunAtLoad covers future logins even if this fails.
    let output = Command::new("launchctl")
        .arg("load")
        .arg(&path)
        .output()
        .context("Failed to execute launchctl load")?;
    if !output.status.success() {
        bail!(
            "launchctl load failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    info!("LaunchAgent installed and loaded: {}", path.display());
    Ok(())
}

pub fn unregister(id: &str) -> Result<()> {
    let path = plist_path(id)?;
    if !path.is_file() {
        return Ok(()); // already absent
    }

    // Unload failures are expected when the agent never loaded (e.g. the
    // registering session crashed); removing the plist is the real cleanup.
    let output = Command::new("launchctl")
        .arg("unload")
        .arg(&path)
        .output()
        .context("Failed to execute launchctl unload")?;
    if !output.status.success() {
        warn!(
            "launchctl unload: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    std::fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
    info!("LaunchAgent uninstalled: {}", path.display());
    Ok(())
}

/// Generate the LaunchAgent plist XML.
fn generate_plist(id: &str, command: &LaunchCommand) -> Result<String> {
    let mut dict = HashMap::new();

    dict.insert("Label".to_string(), Value::String(id.to_string()));

    let mut program_args = vec![Value::String(
        command.program.to_string_lossy().into_owned(),
    )];
    program_args.extend(command.args.iter().map(|a| Value::String(a.clone())));
    dict.insert("ProgramArguments".to_string(), Value::Array(program_args));

    dict.insert(
        "WorkingDirectory".to_string(),
        Value::String(command.workdir.to_string_lossy().into_owned()),
    );

    // Launch once per login; the app manages its own lifetime after that.
    dict.insert("RunAtLoad".to_string(), Value::Boolean(true));
    dict.insert("KeepAlive".to_string(), Value::Boolean(false));

    dict.insert(
        "StandardOutPath".to_string(),
        Value::String(
            command
                .workdir
                .join("autosync_stdout.log")
                .to_string_lossy()
                .into_owned(),
        ),
    );
    dict.insert(
        "StandardErrorPath".to_string(),
        Value::String(
            command
                .workdir
                .join("autosync_stderr.log")
                .to_string_lossy()
                .into_owned(),
        ),
    );

    let mut buf = Vec::new();
    plist::to_writer_xml(&mut buf, &Value::Dictionary(dict.into_iter().collect()))
        .context("Failed to generate plist")?;
    String::from_utf8(buf).context("Plist contains invalid UTF-8")
}
