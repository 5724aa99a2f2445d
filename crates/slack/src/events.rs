use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    hears::{HearsRouter, SkillError},
    reply::{ReplyError, ReplyTarget, Replier},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    Message(MessageEvent),
    BotChannelJoin(ChannelJoinEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::Message(_) => SlackEventType::Message,
            Self::BotChannelJoin(_) => SlackEventType::BotChannelJoin,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    Message,
    BotChannelJoin,
    Unsupported,
}

/// Where a message was heard, relative to the bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Sent in a direct message channel with the bot.
    DirectMessage,
    /// Starts with an @-mention of the bot.
    DirectMention,
    /// Mentions the bot somewhere after the start.
    Mention,
    /// Any other channel message the bot can see.
    Ambient,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub user_id: String,
    /// Message text, with a leading bot mention removed for direct mentions.
    pub text: String,
    pub ts: String,
    pub thread_ts: Option<String>,
    pub kind: MessageKind,
}

impl MessageEvent {
    pub fn reply_target(&self) -> ReplyTarget {
        ReplyTarget { channel_id: self.channel_id.clone(), thread_ts: self.thread_ts.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelJoinEvent {
    pub channel_id: String,
    pub user_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded,
    Processed,
    Ignored,
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error(transparent)]
    Skill(#[from] SkillError),
    #[error("channel join greeting failed: {0}")]
    Greeting(#[source] ReplyError),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Runs the first skill whose trigger matches an incoming message.
pub struct MessageHandler {
    router: HearsRouter,
    replier: Arc<dyn Replier>,
}

impl MessageHandler {
    pub fn new(router: HearsRouter, replier: Arc<dyn Replier>) -> Self {
        Self { router, replier }
    }
}

#[async_trait]
impl EventHandler for MessageHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let Some(skill) = self.router.route(event) else {
            return Ok(HandlerResult::Ignored);
        };

        skill.respond(event, ctx, self.replier.as_ref()).await?;
        Ok(HandlerResult::Responded)
    }
}

pub struct ChannelJoinHandler {
    greeting: String,
    replier: Arc<dyn Replier>,
}

impl ChannelJoinHandler {
    pub fn new(greeting: impl Into<String>, replier: Arc<dyn Replier>) -> Self {
        Self { greeting: greeting.into(), replier }
    }
}

#[async_trait]
impl EventHandler for ChannelJoinHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BotChannelJoin
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BotChannelJoin(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let target = ReplyTarget { channel_id: event.channel_id.clone(), thread_ts: None };
        self.replier.reply(&target, &self.greeting).await.map_err(EventHandlerError::Greeting)?;
        Ok(HandlerResult::Responded)
    }
}
