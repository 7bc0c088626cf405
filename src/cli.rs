use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "AutoSync install and auto-start manager")]
pub struct Args {
    /// Sub‑commands (install, uninstall, status)
    #[command(subcommand)]
    pub sub: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Install AutoSync, register it for auto-start, and start it
    Install {
        /// Install directory (default: per-user data dir)
        #[arg(long)]
        install_root: Option<PathBuf>,

        /// Git remote to fetch the app source from
        #[arg(long)]
        remote: Option<String>,

        /// OAuth client id written into a fresh user_config.json
        #[arg(long)]
        client_id: Option<String>,

        /// OAuth tenant id written into a fresh user_config.json
        #[arg(long)]
        tenant_id: Option<String>,

        /// Local folder to sync, written into a fresh user_config.json
        #[arg(long)]
        local_folder: Option<PathBuf>,

        /// Remote poll interval in seconds, written into a fresh user_config.json
        #[arg(long)]
        poll_interval: Option<u64>,

        /// Register auto-start but do not start the app now
        #[arg(long)]
        no_start: bool,
    },
    /// Remove the install tree, auto-start entry, and any running instance
    Uninstall {
        /// Install directory (default: per-user data dir)
        #[arg(long)]
        install_root: Option<PathBuf>,
    },
    /// Report install/registration/run state (Exit 0 = fully installed)
    Status {
        /// Install directory (default: per-user data dir)
        #[arg(long)]
        install_root: Option<PathBuf>,
    },
}
