use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SLACK_API_BASE_URL: &str = "https://slack.com/api";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub schedule: ScheduleConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub mode: SlackMode,
    pub api_base_url: String,
}

/// How the bot talks to Slack, decided once while loading configuration.
#[derive(Clone, Debug)]
pub enum SlackMode {
    /// A legacy custom-integration bot token driving the RTM websocket.
    CustomIntegration { token: SecretString },
    /// A Slack app using Socket Mode with an app-level token plus a bot token.
    App { app_token: SecretString, bot_token: SecretString },
}

impl SlackMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CustomIntegration { .. } => "custom_integration",
            Self::App { .. } => "app",
        }
    }

    /// Token used for Web API calls such as `chat.postMessage`.
    pub fn bot_token(&self) -> &SecretString {
        match self {
            Self::CustomIntegration { token } => token,
            Self::App { bot_token, .. } => bot_token,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ScheduleConfig {
    pub notify_on_failure: bool,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub slack_app_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_legacy_token: Option<String>,
    pub slack_api_base_url: Option<String>,
    pub notify_on_failure: Option<bool>,
    pub health_check_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            settings.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("ackbar.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        settings.apply_env_overrides()?;
        settings.apply_overrides(options.overrides);
        settings.resolve()
    }
}

/// Loosely typed settings gathered from every source before the Slack mode
/// is resolved.
struct Settings {
    slack_app_token: Option<SecretString>,
    slack_bot_token: Option<SecretString>,
    slack_legacy_token: Option<SecretString>,
    slack_api_base_url: String,
    schedule: ScheduleConfig,
    server: ServerConfig,
    logging: LoggingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            slack_app_token: None,
            slack_bot_token: None,
            slack_legacy_token: None,
            slack_api_base_url: DEFAULT_SLACK_API_BASE_URL.to_string(),
            schedule: ScheduleConfig::default(),
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl Settings {
    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(app_token) = slack.app_token {
                self.slack_app_token = Some(secret_value(app_token));
            }
            if let Some(bot_token) = slack.bot_token {
                self.slack_bot_token = Some(secret_value(bot_token));
            }
            if let Some(legacy_token) = slack.legacy_token {
                self.slack_legacy_token = Some(secret_value(legacy_token));
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack_api_base_url = api_base_url;
            }
        }

        if let Some(schedule) = patch.schedule {
            if let Some(notify_on_failure) = schedule.notify_on_failure {
                self.schedule.notify_on_failure = notify_on_failure;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ACKBAR_SLACK_APP_TOKEN") {
            self.slack_app_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("ACKBAR_SLACK_BOT_TOKEN") {
            self.slack_bot_token = Some(secret_value(value));
        }
        // `TOKEN` and `SLACK_TOKEN` are the names older deployments of the bot used.
        let legacy_token = read_env("ACKBAR_SLACK_TOKEN")
            .or_else(|| read_env("TOKEN"))
            .or_else(|| read_env("SLACK_TOKEN"));
        if let Some(value) = legacy_token {
            self.slack_legacy_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("ACKBAR_SLACK_API_BASE_URL") {
            self.slack_api_base_url = value;
        }

        if let Some(value) = read_env("ACKBAR_SCHEDULE_NOTIFY_ON_FAILURE") {
            self.schedule.notify_on_failure =
                parse_bool("ACKBAR_SCHEDULE_NOTIFY_ON_FAILURE", &value)?;
        }

        if let Some(value) = read_env("ACKBAR_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ACKBAR_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("ACKBAR_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level = read_env("ACKBAR_LOGGING_LEVEL").or_else(|| read_env("ACKBAR_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ACKBAR_LOGGING_FORMAT").or_else(|| read_env("ACKBAR_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(app_token) = overrides.slack_app_token {
            self.slack_app_token = Some(secret_value(app_token));
        }
        if let Some(bot_token) = overrides.slack_bot_token {
            self.slack_bot_token = Some(secret_value(bot_token));
        }
        if let Some(legacy_token) = overrides.slack_legacy_token {
            self.slack_legacy_token = Some(secret_value(legacy_token));
        }
        if let Some(api_base_url) = overrides.slack_api_base_url {
            self.slack_api_base_url = api_base_url;
        }
        if let Some(notify_on_failure) = overrides.notify_on_failure {
            self.schedule.notify_on_failure = notify_on_failure;
        }
        if let Some(health_check_port) = overrides.health_check_port {
            self.server.health_check_port = health_check_port;
        }
    }

    fn resolve(self) -> Result<AppConfig, ConfigError> {
        let mode = resolve_slack_mode(
            self.slack_legacy_token,
            self.slack_app_token,
            self.slack_bot_token,
        )?;
        validate_api_base_url(&self.slack_api_base_url)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;

        Ok(AppConfig {
            slack: SlackConfig { mode, api_base_url: self.slack_api_base_url },
            schedule: self.schedule,
            server: self.server,
            logging: self.logging,
        })
    }
}

fn resolve_slack_mode(
    legacy_token: Option<SecretString>,
    app_token: Option<SecretString>,
    bot_token: Option<SecretString>,
) -> Result<SlackMode, ConfigError> {
    if let Some(token) = legacy_token {
        validate_bot_token("slack.legacy_token", token.expose_secret())?;
        return Ok(SlackMode::CustomIntegration { token });
    }

    match (app_token, bot_token) {
        (None, None) => Err(ConfigError::Validation(
            "slack credentials are missing: set ACKBAR_SLACK_TOKEN (or TOKEN) for a custom \
             integration, or ACKBAR_SLACK_APP_TOKEN and ACKBAR_SLACK_BOT_TOKEN for an app"
                .to_string(),
        )),
        (Some(_), None) => Err(ConfigError::Validation(
            "slack.bot_token is required alongside slack.app_token. Get it from \
             https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token"
                .to_string(),
        )),
        (None, Some(_)) => Err(ConfigError::Validation(
            "slack.app_token is required alongside slack.bot_token. Get it from \
             https://api.slack.com/apps > Your App > Basic Information > App-Level Tokens"
                .to_string(),
        )),
        (Some(app_token), Some(bot_token)) => {
            validate_app_token(app_token.expose_secret())?;
            validate_bot_token("slack.bot_token", bot_token.expose_secret())?;
            Ok(SlackMode::App { app_token, bot_token })
        }
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("ackbar.toml"), PathBuf::from("config/ackbar.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_app_token(app_token: &str) -> Result<(), ConfigError> {
    if !app_token.starts_with("xapp-") {
        let hint = if app_token.starts_with("xoxb-") {
            " (hint: you may have used the bot token instead of the app token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.app_token must start with `xapp-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    Ok(())
}

fn validate_bot_token(key: &str, bot_token: &str) -> Result<(), ConfigError> {
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{key} must not be empty")));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "{key} must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    Ok(())
}

fn validate_api_base_url(base_url: &str) -> Result<(), ConfigError> {
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "slack.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    schedule: Option<SchedulePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    app_token: Option<String>,
    bot_token: Option<String>,
    legacy_token: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulePatch {
    notify_on_failure: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
