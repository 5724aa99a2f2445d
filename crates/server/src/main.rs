mod bootstrap;
mod health;

use ackbar_core::config::{AppConfig, LoadOptions};
use anyhow::Result;

fn init_logging(config: &AppConfig) {
    use ackbar_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging reads its level and format from config, so load that first.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState {
            connection: app.slack_runner.status(),
            slack_mode: app.config.slack.mode.label(),
        },
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        slack_mode = app.config.slack.mode.label(),
        "ackbar-server started"
    );

    tokio::select! {
        result = app.slack_runner.start() => {
            result?;
            tracing::info!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                "slack session ended"
            );
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                "ackbar-server stopping"
            );
        }
    }

    Ok(())
}
