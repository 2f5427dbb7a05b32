//! # clawboard-bot
//!
//! Bot binary: connects to the relay and processes assigned tasks, or
//! creates a task through the dashboard API.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clawboard_bot::api::ApiClient;
use clawboard_bot::tasks::SimulatedProcessor;
use clawboard_bot::{BotClient, BotConfig, RunOutcome};
use clawboard_core::logging;
use clawboard_settings::{BotSettings, ClawboardSettings};
use tracing::{info, warn};

/// Clawboard automation bot.
#[derive(Parser, Debug)]
#[command(name = "clawboard-bot", about = "Clawboard automation bot")]
struct Cli {
    /// Settings file (defaults to `~/.clawboard/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log level (overrides settings).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to the relay and work on assigned tasks (default).
    Run {
        /// Relay socket URL.
        #[arg(long)]
        ws_url: Option<String>,
        /// Name reported with each status update.
        #[arg(long)]
        name: Option<String>,
    },
    /// Create a `todo` project via the dashboard API.
    CreateTask {
        /// Project title.
        #[arg(long)]
        title: String,
        /// Project description.
        #[arg(long, default_value = "")]
        description: String,
        /// API base URL.
        #[arg(long)]
        api_url: Option<String>,
    },
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
    init_logging(&settings, cli.log_level.as_deref());

    let command = cli.command.unwrap_or(Command::Run {
        ws_url: None,
        name: None,
    });
    match command {
        Command::Run { ws_url, name } => {
            let mut bot = settings.bot;
            if let Some(url) = ws_url {
                bot.ws_url = url;
            }
            if let Some(name) = name {
                bot.name = name;
            }
            run_bot(&bot).await
        }
        Command::CreateTask {
            title,
            description,
            api_url,
        } => {
            let base = api_url.unwrap_or(settings.bot.api_url);
            let created = ApiClient::new(base)
                .create_task(&title, &description)
                .await
                .context("Failed to create task")?;
            println!("{}", serde_json::to_string_pretty(&created)?);
            Ok(())
        }
    }
}

fn init_logging(settings: &ClawboardSettings, cli_level: Option<&str>) {
    let level = cli_level.unwrap_or(&settings.logging.level);
    if settings.logging.json {
        logging::init_json_subscriber(level);
    } else {
        logging::init_subscriber(level);
    }
}

async fn run_bot(settings: &BotSettings) -> Result<()> {
    let config = BotConfig::from(settings);
    let processor = Arc::new(SimulatedProcessor::new(Duration::from_millis(
        settings.task_duration_ms,
    )));
    let client = Arc::new(BotClient::new(config, processor));
    info!(bot = %settings.name, url = %settings.ws_url, "starting bot");

    let mut runner = tokio::spawn({
        let client = client.clone();
        async move { client.run().await }
    });

    tokio::select! {
        () = shutdown_signal() => {
            info!("shutdown signal received");
            client.shutdown();
            let outcome = (&mut runner).await.context("Bot task failed")?;
            info!(?outcome, "bot stopped");
        }
        outcome = &mut runner => {
            if let RunOutcome::GaveUp { attempts } = outcome.context("Bot task failed")? {
                warn!(attempts, "relay unreachable, waiting for shutdown signal");
            }
            shutdown_signal().await;
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
