use std::sync::Arc;

use ackbar_core::{
    config::{AppConfig, SlackMode},
    schedule::HttpScheduleSource,
};
use ackbar_slack::{
    food_truck::FoodTruckQuery,
    skills::bot_dispatcher,
    socket::SocketRunner,
    web::SlackWebClient,
    websocket::{Protocol, WebSocketTransport},
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub slack_runner: SocketRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        slack_mode = config.slack.mode.label(),
        "starting application bootstrap"
    );

    let http = reqwest::Client::builder()
        .user_agent(concat!("ackbar/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(BootstrapError::HttpClient)?;

    let web = Arc::new(SlackWebClient::new(
        http.clone(),
        config.slack.api_base_url.clone(),
        config.slack.mode.bot_token().clone(),
    ));
    let protocol = match &config.slack.mode {
        SlackMode::CustomIntegration { .. } => Protocol::Rtm,
        SlackMode::App { app_token, .. } => Protocol::SocketMode { app_token: app_token.clone() },
    };
    let transport = Arc::new(WebSocketTransport::new(web.clone(), protocol));

    let food_trucks = FoodTruckQuery::new(HttpScheduleSource::new(http))
        .notify_on_failure(config.schedule.notify_on_failure);
    let dispatcher = bot_dispatcher(food_trucks, web);

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        handlers = dispatcher.handler_count(),
        "slack dispatcher wired"
    );

    Ok(Application { config, slack_runner: SocketRunner::new(transport, dispatcher) })
}

#[cfg(test)]
mod tests {
    use ackbar_core::config::{
        AppConfig, LogFormat, LoggingConfig, ScheduleConfig, ServerConfig, SlackConfig, SlackMode,
        DEFAULT_SLACK_API_BASE_URL,
    };
    use secrecy::SecretString;

    use crate::bootstrap::bootstrap_with_config;

    fn config(mode: SlackMode, notify_on_failure: bool) -> AppConfig {
        AppConfig {
            slack: SlackConfig { mode, api_base_url: DEFAULT_SLACK_API_BASE_URL.to_string() },
            schedule: ScheduleConfig { notify_on_failure },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_owned())
    }

    #[test]
    fn bootstrap_wires_app_mode_without_touching_the_network() {
        let mode =
            SlackMode::App { app_token: secret("xapp-test"), bot_token: secret("xoxb-test") };

        let app = bootstrap_with_config(config(mode, true))
            .expect("bootstrap should succeed with an app config");

        assert_eq!(app.config.slack.mode.label(), "app");
        assert!(app.config.schedule.notify_on_failure);
        assert!(!app.slack_runner.status().is_connected());
    }

    #[test]
    fn bootstrap_wires_custom_integration_mode() {
        let mode = SlackMode::CustomIntegration { token: secret("xoxb-legacy") };

        let app = bootstrap_with_config(config(mode, false))
            .expect("bootstrap should succeed with a custom integration config");

        assert_eq!(app.config.slack.mode.label(), "custom_integration");
        assert!(!app.config.schedule.notify_on_failure);
        assert!(!app.slack_runner.status().is_connected());
    }
}
