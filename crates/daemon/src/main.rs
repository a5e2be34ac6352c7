#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Desktop bridge daemon: serves the chat front end and relays desktop output.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use deskbridge_core::config::{BridgeConfig, DEFAULT_CONFIG_FILE};
use deskbridge_daemon::adapters::{CommandActuator, CommandCapture, HttpTransport};
use deskbridge_daemon::store::SnapshotStore;
use deskbridge_daemon::{http, spawn_watcher, stop_watcher_on, Adapters, Bridge};
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "deskbridge-daemon", version, about = "Chat to desktop-app bridge worker")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override `server.listen`, e.g. 127.0.0.1:8787
    #[arg(long)]
    listen: Option<String>,

    /// Transport token. Takes precedence over DESKBRIDGE_TRANSPORT_TOKEN and the config file.
    #[arg(long)]
    token: Option<String>,

    /// Start with output monitoring switched off.
    #[arg(long, default_value_t = false)]
    no_monitor: bool,

    /// Override `watcher.state_file`.
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    fmt().with_target(false).with_env_filter(filter).init();

    let mut cfg = BridgeConfig::load_or_default(&cli.config)?;
    cfg.apply_env();
    cfg.apply_token_override(cli.token.clone());
    if let Some(listen) = &cli.listen {
        cfg.server.listen = listen.clone();
    }
    if let Some(path) = &cli.state_file {
        cfg.watcher.state_file = path.clone();
    }
    if cli.no_monitor {
        cfg.watcher.enabled = false;
    }
    cfg.validate().context("configuration check failed")?;

    info!(
        config = %cli.config.display(),
        security = cfg.security.enabled,
        allowed = cfg.security.allowed.len(),
        poll_interval_ms = cfg.watcher.poll_interval_ms,
        submit = ?cfg.desktop.submit_method(),
        "starting bridge"
    );

    let recipients: Vec<_> = cfg.gate().allowed().collect();
    if recipients.is_empty() {
        warn!("allow-set is empty; relayed output has no recipients");
    }
    let transport = HttpTransport::new(&cfg.transport, recipients)?;
    let adapters = Adapters {
        actuator: Arc::new(CommandActuator::from_config(&cfg.desktop)),
        capture: Arc::new(CommandCapture::from_config(&cfg.desktop)),
        transport: Arc::new(transport),
    };
    let store = Arc::new(SnapshotStore::open(&cfg.watcher.state_file).await);
    let bridge = Arc::new(Bridge::new(&cfg, adapters, store));

    let (stop_tx, stop_rx) = watch::channel(false);
    let watcher = spawn_watcher(Arc::clone(&bridge), stop_rx);

    let app = http::router(bridge);
    let addr: SocketAddr = cfg
        .server
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {}", cfg.server.listen))?;
    info!("listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(stop_watcher_on(shutdown_signal(), stop_tx))
        .await?;

    watcher.await.context("watcher task panicked")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    // The supervisor stops workers with SIGTERM.
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
