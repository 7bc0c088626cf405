use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::error;

use autosyncctl::cli;
use autosyncctl::config::UserConfig;
use autosyncctl::detect;
use autosyncctl::fetch::DEFAULT_REMOTE;
use autosyncctl::manager::InstallManager;

fn main() {
    // Initialize logger with custom format for the CLI
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: Failed to create Tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(real_main()) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn real_main() -> Result<()> {
    let args = cli::Args::parse();

    match args.sub {
        cli::Cmd::Install {
            install_root,
            remote,
            client_id,
            tenant_id,
            local_folder,
            poll_interval,
            no_start,
        } => {
            handle_install(
                install_root,
                remote,
                client_id,
                tenant_id,
                local_folder,
                poll_interval,
                no_start,
            )
            .await
        }
        cli::Cmd::Uninstall { install_root } => handle_uninstall(install_root),
        cli::Cmd::Status { install_root } => handle_status(install_root),
    }
}

fn resolve_root(install_root: Option<PathBuf>) -> PathBuf {
    install_root.unwrap_or_else(detect::default_install_root)
}

#[allow(clippy::too_many_arguments)]
async fn handle_install(
    install_root: Option<PathBuf>,
    remote: Option<String>,
    client_id: Option<String>,
    tenant_id: Option<String>,
    local_folder: Option<PathBuf>,
    poll_interval: Option<u64>,
    no_start: bool,
) -> Result<()> {
    let root = resolve_root(install_root);
    let remote = remote.unwrap_or_else(|| DEFAULT_REMOTE.to_string());

    let mut defaults = UserConfig::defaults_for(&root);
    if let Some(client_id) = client_id {
        defaults.client_id = client_id;
    }
    if let Some(tenant_id) = tenant_id {
        defaults.tenant_id = tenant_id;
    }
    if let Some(local_folder) = local_folder {
        defaults.local_folder = local_folder;
    }
    if let Some(poll_interval) = poll_interval {
        defaults.poll_interval = poll_interval;
    }

    let mut manager = InstallManager::host(root, remote);
    if no_start {
        manager = manager.without_start();
    }

    let outcome = manager.install(&defaults).await?;

    println!("AutoSync installed at {}", outcome.install_root.display());
    if outcome.config_preserved {
        println!("Existing user_config.json preserved");
    } else {
        println!("Wrote default user_config.json");
    }
    if outcome.auto_start_registered {
        println!("Auto-start registered for this user");
    }
    if outcome.startup_not_confirmed {
        println!("Startup not confirmed yet; it will start at next login");
    }
    for warning in &outcome.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}

fn handle_uninstall(install_root: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(install_root);
    let manager = InstallManager::host(root, DEFAULT_REMOTE.to_string());

    let outcome = manager.uninstall()?;

    if outcome.unregistered {
        println!("Auto-start entry removed");
    } else {
        println!("Auto-start entry already absent");
    }
    if outcome.terminated > 0 {
        println!("Terminated {} running instance(s)", outcome.terminated);
    }
    if outcome.removed_tree {
        println!("Install tree removed");
    } else {
        println!("Install tree already absent");
    }
    for warning in &outcome.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}

fn handle_status(install_root: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(install_root);
    let manager = InstallManager::host(root, DEFAULT_REMOTE.to_string());

    let report = manager.status();
    println!("Install root:  {}", report.state.install_root.display());
    println!("Installed:     {}", report.state.is_present);
    println!("Virtualenv:    {}", report.state.has_virtual_env);
    println!("Config:        {}", report.state.has_config);
    println!("Auto-start:    {}", report.auto_start_registered);
    if report.running_pids.is_empty() {
        println!("Running:       no");
    } else {
        println!(
            "Running:       yes (pid {})",
            report
                .running_pids
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let fully_installed = report.state.is_present
        && report.state.has_virtual_env
        && report.state.has_config
        && report.auto_start_registered;
    std::process::exit(if fully_installed { 0 } else { 1 });
}
