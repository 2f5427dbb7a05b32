//! # clawboard
//!
//! Relay server binary: loads settings, starts the HTTP + socket relay, and
//! shuts down gracefully on SIGINT/SIGTERM.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use clawboard_core::logging;
use clawboard_server::config::ServerConfig;
use clawboard_server::server::RelayServer;
use clawboard_server::shutdown::DrainOutcome;
use clawboard_settings::ServerSettings;
use tracing::{info, warn};

/// Clawboard relay server.
#[derive(Parser, Debug)]
#[command(name = "clawboard", about = "Clawboard realtime relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.clawboard/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

fn server_config(settings: &ServerSettings, cli: &Cli) -> ServerConfig {
    ServerConfig {
        host: cli.host.clone().unwrap_or_else(|| settings.host.clone()),
        port: cli.port.unwrap_or(settings.port),
        max_connections: settings.max_connections,
        heartbeat_interval_secs: settings.heartbeat_interval_secs,
        heartbeat_timeout_secs: settings.heartbeat_timeout_secs,
        send_queue_size: settings.send_queue_size,
        notify_bot_missing: settings.notify_bot_missing,
        ..ServerConfig::default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli
        .settings
        .clone()
        .unwrap_or_else(clawboard_settings::settings_path);
    let settings = clawboard_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    let level = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    if settings.logging.json {
        logging::init_json_subscriber(level);
    } else {
        logging::init_subscriber(level);
    }

    let mut server = RelayServer::new(server_config(&settings.server, &cli));
    match clawboard_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => warn!(error = %e, "metrics disabled"),
    }

    let (addr, serve) = server
        .listen()
        .await
        .context("Failed to bind relay server")?;
    info!("Clawboard relay listening on http://{addr} (ws://{addr}/ws)");

    shutdown_signal().await;
    info!("shutting down");
    match server
        .shutdown()
        .drain(serve, Some(Duration::from_secs(10)))
        .await
    {
        DrainOutcome::Drained => info!("relay stopped"),
        DrainOutcome::TimedOut { remaining_sessions } => {
            warn!(remaining_sessions, "relay stopped with sessions still open");
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                let _ = signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
