//! jirabot - Slack bot binary.
//!
//! Loads the configuration, verifies the Slack credentials and listens for
//! channel messages over Socket Mode until Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use jirabot_engine::{BotConfig, IssueBot};
use jirabot_slack::{SlackApiClient, SlackBot};

/// Slack bot that enriches Jira issue references
#[derive(Parser)]
#[command(name = "jirabot")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "JIRABOT_CONFIG", default_value = "jirabot.toml")]
    config: PathBuf,

    /// Log level (overrides `logging.level`)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

async fn run(config: BotConfig) -> Result<()> {
    let slack_config = config.slack.to_slack_config();
    let transport =
        SlackApiClient::new(slack_config.clone()).context("Failed to create Slack client")?;
    let handler = IssueBot::from_config(&config, Arc::new(transport))
        .context("Failed to set up the bot")?;

    let bot = Arc::new(SlackBot::new(slack_config).context("Failed to create Slack listener")?);
    bot.set_event_handler(Arc::new(handler)).await;

    let signal_bot = Arc::clone(&bot);
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_bot.shutdown();
    });

    info!("Starting {} (press Ctrl+C to stop)", config.slack.bot_name);
    bot.start().await.context("Slack listener stopped")?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let loaded = BotConfig::load(&args.config);

    let (level, json) = match &loaded {
        Ok(config) => (
            args.log_level
                .clone()
                .unwrap_or_else(|| config.logging.level.clone()),
            args.json_logs || config.logging.json,
        ),
        Err(_) => (
            args.log_level.clone().unwrap_or_else(|| "info".to_string()),
            args.json_logs,
        ),
    };
    setup_logging(&level, json);

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config from {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if args.check {
        info!("Configuration {} is valid", args.config.display());
        return ExitCode::SUCCESS;
    }

    if let Err(e) = run(config).await {
        error!("{:#}", e);
        return ExitCode::FAILURE;
    }

    info!("Bot stopped");
    ExitCode::SUCCESS
}
