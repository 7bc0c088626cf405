//! Linux auto-start via an XDG autostart desktop entry.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

use super::LaunchCommand;
use crate::detect::APP_NAME;

fn autostart_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|c| c.join("autostart"))
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

fn entry_path(id: &str) -> Result<PathBuf> {
    Ok(autostart_dir()?.join(format!("{id}.desktop")))
}

pub fn is_registered(id: &str) -> Result<bool> {
    Ok(entry_path(id)?.is_file())
}

pub fn register(id: &str, command: &LaunchCommand) -> Result<()> {
    let dir = autostart_dir()?;
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let path = entry_path(id)?;
    std::fs::write(&path, desktop_entry(command))
        .with_context(|| format!("writing {}", path.display()))?;
    info!("Autostart entry installed: {}", path.display());
    Ok(())
}

pub fn unregister(id: &str) -> Result<()> {
    let path = entry_path(id)?;
    if !path.is_file() {
        return Ok(()); // already absent
    }
    std::fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
    info!("Autostart entry removed: {}", path.display());
    Ok(())
}

/// Generate the .desktop entry body.
fn desktop_entry(command: &LaunchCommand) -> String {
    let mut exec = quote_arg(&command.program.to_string_lossy());
    for arg in &command.args {
        exec.push(' ');
        exec.push_str(&quote_arg(arg));
    }

    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name={APP_NAME}\n\
         Exec={exec}\n\
         Path={}\n\
         Terminal=false\n\
         X-GNOME-Autostart-enabled=true\n",
        command.workdir.display()
    )
}

/// Exec-field quoting per the desktop entry spec: double-quote anything with
/// whitespace, escape embedded quotes and backslashes.
fn quote_arg(arg: &str) -> String {
    if !arg.contains(|c: char| c.is_whitespace() || c == '"') {
        return arg.to_string();
    }
    let escaped = arg.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
