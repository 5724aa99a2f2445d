use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    events::{EventContext, MessageEvent, MessageKind},
    reply::{ReplyError, Replier},
};

#[derive(Debug, Error)]
pub enum SkillError {
    #[error(transparent)]
    Reply(#[from] ReplyError),
}

/// Something the bot does when a trigger phrase is heard.
#[async_trait]
pub trait Skill: Send + Sync {
    async fn respond(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
        replier: &dyn Replier,
    ) -> Result<(), SkillError>;
}

/// Phrases matched case-insensitively anywhere in the text, limited to the
/// message kinds the skill should answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trigger {
    patterns: Vec<String>,
    kinds: Vec<MessageKind>,
}

impl Trigger {
    pub fn new(patterns: &[&str], kinds: &[MessageKind]) -> Self {
        Self {
            patterns: patterns.iter().map(|pattern| pattern.to_lowercase()).collect(),
            kinds: kinds.to_vec(),
        }
    }

    pub fn matches(&self, event: &MessageEvent) -> bool {
        if !self.kinds.contains(&event.kind) {
            return false;
        }

        let text = event.text.to_lowercase();
        self.patterns.iter().any(|pattern| text.contains(pattern.as_str()))
    }
}

#[derive(Default)]
pub struct HearsRouter {
    routes: Vec<(Trigger, Arc<dyn Skill>)>,
}

impl HearsRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes are tried in registration order.
    pub fn hears<S>(mut self, trigger: Trigger, skill: S) -> Self
    where
        S: Skill + 'static,
    {
        self.routes.push((trigger, Arc::new(skill)));
        self
    }

    pub fn route(&self, event: &MessageEvent) -> Option<&Arc<dyn Skill>> {
        self.routes.iter().find(|(trigger, _)| trigger.matches(event)).map(|(_, skill)| skill)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
