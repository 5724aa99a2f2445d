use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::reply::{ReplyError, ReplyTarget, Replier};

/// Slack refuses empty messages, so blank schedule cells are sent as this.
pub const BLANK_LINE_PLACEHOLDER: &str = "_none listed_";

#[derive(Debug, Error)]
pub enum WebApiError {
    #[error("slack api request `{method}` failed: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("slack api `{method}` returned error `{error}`")]
    Api { method: &'static str, error: String },
    #[error("slack api `{method}` returned an unexpected payload: {source}")]
    Payload {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct BotIdentity {
    pub user_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RtmSession {
    pub url: String,
    pub bot_user_id: String,
}

#[derive(Deserialize)]
struct RtmConnectResponse {
    url: String,
    #[serde(rename = "self")]
    bot: RtmSelf,
}

#[derive(Deserialize)]
struct RtmSelf {
    id: String,
}

#[derive(Deserialize)]
struct ConnectionsOpenResponse {
    url: String,
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
}

/// Minimal Slack Web API client covering the calls the bot makes.
#[derive(Clone)]
pub struct SlackWebClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        bot_token: SecretString,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http, base_url, bot_token }
    }

    pub async fn auth_test(&self) -> Result<BotIdentity, WebApiError> {
        self.call("auth.test", &self.bot_token, None::<&()>).await
    }

    pub async fn rtm_connect(&self) -> Result<RtmSession, WebApiError> {
        let response: RtmConnectResponse =
            self.call("rtm.connect", &self.bot_token, None::<&()>).await?;
        Ok(RtmSession { url: response.url, bot_user_id: response.bot.id })
    }

    /// Opens a Socket Mode session; needs the app-level token.
    pub async fn open_socket_connection(
        &self,
        app_token: &SecretString,
    ) -> Result<String, WebApiError> {
        let response: ConnectionsOpenResponse =
            self.call("apps.connections.open", app_token, None::<&()>).await?;
        Ok(response.url)
    }

    pub async fn post_message(&self, target: &ReplyTarget, text: &str) -> Result<(), WebApiError> {
        let text = if text.trim().is_empty() { BLANK_LINE_PLACEHOLDER } else { text };
        let request = PostMessageRequest {
            channel: &target.channel_id,
            text,
            thread_ts: target.thread_ts.as_deref(),
        };
        let _: Value = self.call("chat.postMessage", &self.bot_token, Some(&request)).await?;
        debug!(
            event_name = "egress.slack.message_posted",
            channel_id = %target.channel_id,
            "posted slack message"
        );
        Ok(())
    }

    async fn call<B, T>(
        &self,
        method: &'static str,
        token: &SecretString,
        body: Option<&B>,
    ) -> Result<T, WebApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(token.expose_secret());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| WebApiError::Transport { method, source })?;
        let payload: Value =
            response.json().await.map_err(|source| WebApiError::Transport { method, source })?;

        if payload.get("ok").and_then(Value::as_bool) != Some(true) {
            let error =
                payload.get("error").and_then(Value::as_str).unwrap_or("unknown_error").to_owned();
            return Err(WebApiError::Api { method, error });
        }

        serde_json::from_value(payload).map_err(|source| WebApiError::Payload { method, source })
    }
}

#[async_trait]
impl Replier for SlackWebClient {
    async fn reply(&self, target: &ReplyTarget, text: &str) -> Result<(), ReplyError> {
        self.post_message(target, text).await.map_err(|error| match error {
            WebApiError::Api { error, .. } => ReplyError::Rejected(error),
            other => ReplyError::Transport(other.to_string()),
        })
    }
}
