use async_trait::async_trait;
use thiserror::Error;

/// Channel, and thread when the triggering message was threaded, to answer in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyTarget {
    pub channel_id: String,
    pub thread_ts: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplyError {
    #[error("reply request failed: {0}")]
    Transport(String),
    #[error("slack rejected reply: {0}")]
    Rejected(String),
}

/// Outbound channel for everything the bot says.
#[async_trait]
pub trait Replier: Send + Sync {
    async fn reply(&self, target: &ReplyTarget, text: &str) -> Result<(), ReplyError>;
}
