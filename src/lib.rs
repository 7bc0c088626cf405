//! autosyncctl: install, auto-start, and uninstall manager for AutoSync.
//!
//! The core is [`manager::InstallManager`], a state-reconciliation routine
//! over the install tree and the platform auto-start registry. Everything
//! with side effects beyond those two (git, virtualenv, process control, the
//! health probe) sits behind a collaborator trait.

pub mod autostart;
pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod fetch;
pub mod health;
pub mod lock;
pub mod manager;
pub mod process;
pub mod provision;
