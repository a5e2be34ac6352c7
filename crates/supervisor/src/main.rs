#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Bridge supervisor: restarts the worker on crashes, with a bounded budget.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use deskbridge_core::config::{BridgeConfig, DEFAULT_CONFIG_FILE};
use deskbridge_supervisor::process::ProcessLauncher;
use deskbridge_supervisor::Supervisor;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "deskbridge-supervisor", version, about = "Restart supervisor for the bridge worker")]
struct Cli {
    /// Path to the TOML config file (shared with the worker).
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override `supervisor.max_restarts`.
    #[arg(long)]
    max_restarts: Option<u32>,

    /// Override `supervisor.restart_delay_ms`.
    #[arg(long)]
    restart_delay_ms: Option<u64>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log: String,

    /// Worker command. Defaults to `supervisor.worker`, then to the daemon binary next to
    /// this one.
    #[arg(last = true)]
    worker: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    fmt().with_target(false).with_env_filter(filter).init();

    let mut cfg = BridgeConfig::load_or_default(&cli.config)?;
    if let Some(n) = cli.max_restarts {
        cfg.supervisor.max_restarts = n;
    }
    if let Some(ms) = cli.restart_delay_ms {
        cfg.supervisor.restart_delay_ms = ms;
    }
    anyhow::ensure!(
        cfg.supervisor.max_restarts > 0,
        "supervisor.max_restarts must be > 0"
    );
    anyhow::ensure!(
        cfg.supervisor.poll_interval_ms > 0,
        "supervisor.poll_interval_ms must be > 0"
    );

    let argv = if !cli.worker.is_empty() {
        cli.worker.clone()
    } else if !cfg.supervisor.worker.is_empty() {
        cfg.supervisor.worker.clone()
    } else {
        default_worker(&cli.config)?
    };
    info!(worker = ?argv, "supervising worker");

    let supervisor = Supervisor::new(ProcessLauncher::new(argv)?, &cfg.supervisor);

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    let exit = supervisor.run(stop_rx).await;
    let state = exit.into_result()?;
    info!(
        launches = state.launches,
        restarts = state.restart_count,
        "supervisor exiting"
    );
    Ok(())
}

/// The daemon binary installed next to this executable.
fn default_worker(config: &Path) -> anyhow::Result<Vec<String>> {
    let exe = std::env::current_exe().context("locate supervisor executable")?;
    let dir = exe.parent().context("supervisor executable has no parent dir")?;
    let daemon = dir.join(format!("deskbridge-daemon{}", std::env::consts::EXE_SUFFIX));
    Ok(vec![
        daemon.display().to_string(),
        "--config".to_string(),
        config.display().to_string(),
    ])
}

/// Ctrl-C, or SIGTERM from a service manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown requested");
}
