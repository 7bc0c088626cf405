//! Auto-start registration - delegates to OS-native login mechanisms
//!
//! Provides a unified interface for registering the app to launch at user
//! login across different operating systems:
//! - macOS: LaunchAgent plist in ~/Library/LaunchAgents (launchctl)
//! - Linux: XDG autostart .desktop entry in ~/.config/autostart
//! - Windows: VBScript launcher in the Start Menu Startup folder

use std::path::PathBuf;

use anyhow::Result;

// Platform-specific implementations
cfg_if::cfg_if! {
    if #[cfg(target_os = "macos")] {
        mod macos;
        use macos as platform;
    } else if #[cfg(target_os = "windows")] {
        mod windows;
        use windows as platform;
    } else {
        mod linux;
        use linux as platform;
    }
}

/// Command line an auto-start entry launches at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub workdir: PathBuf,
}

/// Platform auto-start registry keyed by a stable identifier.
///
/// Implementations treat "already absent" on unregister as success: the whole
/// point of the registry is converging on a state, not performing an action.
pub trait AutoStart {
    fn is_registered(&self, id: &str) -> Result<bool>;
    fn register(&self, id: &str, command: &LaunchCommand) -> Result<()>;
    fn unregister(&self, id: &str) -> Result<()>;
}

/// Registry for the host OS.
pub struct PlatformAutoStart;

impl AutoStart for PlatformAutoStart {
    fn is_registered(&self, id: &str) -> Result<bool> {
        platform::is_registered(id)
    }

    fn register(&self, id: &str, command: &LaunchCommand) -> Result<()> {
        platform::register(id, command)
    }

    fn unregister(&self, id: &str) -> Result<()> {
        platform::unregister(id)
    }
}
