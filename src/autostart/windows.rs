//! Windows auto-start via a Startup-folder VBScript.
//!
//! A .vbs launcher (rather than a plain shortcut) lets the app start through
//! pythonw.exe with no console window flashing at login.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

use super::LaunchCommand;

fn startup_dir() -> Result<PathBuf> {
    // dirs::config_dir() is %APPDATA% (Roaming) on Windows.
    dirs::config_dir()
        .map(|c| {
            c.join("Microsoft")
                .join("Windows")
                .join("Start Menu")
                .join("Programs")
                .join("Startup")
        })
        .ok_or_else(|| anyhow::anyhow!("Could not determine APPDATA directory"))
}

fn script_path(id: &str) -> Result<PathBuf> {
    Ok(startup_dir()?.join(format!("{id}.vbs")))
}

pub fn is_registered(id: &str) -> Result<bool> {
    Ok(script_path(id)?.is_file())
}

pub fn register(id: &str, command: &LaunchCommand) -> Result<()> {
    let dir = startup_dir()?;
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let path = script_path(id)?;
    std::fs::write(&path, vbs_content(command))
        .with_context(|| format!("writing {}", path.display()))?;
    info!("Startup script installed: {}", path.display());
    Ok(())
}

pub fn unregister(id: &str) -> Result<()> {
    let path = script_path(id)?;
    if !path.is_file() {
        return Ok(()); // already absent
    }
    std::fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
    info!("Startup script removed: {}", path.display());
    Ok(())
}

/// Generate a VBScript that launches the app without a console window.
fn vbs_content(command: &LaunchCommand) -> String {
    // VBScript string literals escape quotes by doubling them; WshShell.Run
    // wants each path wrapped in its own doubled quotes.
    let mut run_line = format!("\"\"{}\"\"", command.program.display());
    for arg in &command.args {
        run_line.push_str(&format!(" \"\"{arg}\"\""));
    }

    format!(
        "Set WshShell = CreateObject(\"WScript.Shell\")\n\
         WshShell.CurrentDirectory = \"{}\"\n\
         WshShell.Run \"{run_line}\", 0, False\n",
        command.workdir.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vbs_runs_hidden_from_workdir() {
        let command = LaunchCommand {
            program: r"C:\Users\u\AppData\Local\AutoSync\venv\Scripts\pythonw.exe".into(),
            args: vec![r"C:\Users\u\AppData\Local\AutoSync\app.py".to_string()],
            workdir: r"C:\Users\u\AppData\Local\AutoSync".into(),
        };

        let vbs = vbs_content(&command);
        assert!(vbs.contains(r#"WshShell.CurrentDirectory = "C:\Users\u\AppData\Local\AutoSync""#));
        assert!(vbs.contains("pythonw.exe"));
        assert!(vbs.contains(", 0, False"));
    }
}
