use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::SCHEDULE_URL;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("schedule request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("schedule request returned HTTP {status}")]
    Status { status: u16 },
}

#[async_trait]
pub trait ScheduleSource: Send + Sync {
    /// Returns the raw HTML of the schedule page.
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// Fetches the schedule page with a single GET and no retries. Every call
/// re-downloads the page.
#[derive(Clone, Debug)]
pub struct HttpScheduleSource {
    client: reqwest::Client,
    url: String,
}

impl Default for HttpScheduleSource {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl HttpScheduleSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_url(client, SCHEDULE_URL)
    }

    pub fn with_url(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ScheduleSource for HttpScheduleSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        debug!(event_name = "schedule.fetch.start", url = %self.url, "fetching schedule page");

        let response = self.client.get(&self.url).send().await.map_err(FetchError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16() });
        }

        let body = response.text().await.map_err(FetchError::Transport)?;
        debug!(
            event_name = "schedule.fetch.done",
            url = %self.url,
            bytes = body.len(),
            "schedule page downloaded"
        );
        Ok(body)
    }
}
