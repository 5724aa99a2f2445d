use std::sync::Arc;

use ackbar_core::schedule::{Clock, ScheduleSource};
use async_trait::async_trait;

use crate::{
    events::{
        ChannelJoinHandler, EventContext, EventDispatcher, MessageEvent, MessageHandler,
        MessageKind,
    },
    food_truck::FoodTruckQuery,
    hears::{HearsRouter, Skill, SkillError, Trigger},
    reply::Replier,
};

pub const CHANNEL_JOIN_GREETING: &str =
    "I have arrived from Mon Cala to tell you where the food trucks are!";
pub const STAR_DESTROYER_REPLY: &str = "It's a trap!";
pub const LAST_JEDI_REPLY: &str = "Okay, I know I got sucked out into space, but do you really think of The Last Jedi when you think of Admiral Ackbar?  No.  You think of Return of the Jedi and the dumb memes.";

/// Replies with one fixed line.
#[derive(Clone, Debug)]
pub struct StaticReply {
    text: String,
}

impl StaticReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl Skill for StaticReply {
    async fn respond(
        &self,
        event: &MessageEvent,
        _ctx: &EventContext,
        replier: &dyn Replier,
    ) -> Result<(), SkillError> {
        replier.reply(&event.reply_target(), &self.text).await?;
        Ok(())
    }
}

/// The bot's trigger phrases, in the order they are tried.
pub fn bot_router<S, C>(food_trucks: FoodTruckQuery<S, C>) -> HearsRouter
where
    S: ScheduleSource + 'static,
    C: Clock + 'static,
{
    use MessageKind::{DirectMention, DirectMessage, Mention};

    HearsRouter::new()
        .hears(
            Trigger::new(&["star destroyers"], &[DirectMessage]),
            StaticReply::new(STAR_DESTROYER_REPLY),
        )
        .hears(
            Trigger::new(
                &["The Last Jedi", "the last jedi", "tlj", "TLJ", "died", "dead"],
                &[DirectMessage, DirectMention],
            ),
            StaticReply::new(LAST_JEDI_REPLY),
        )
        .hears(
            Trigger::new(&["food truck", "trucks"], &[DirectMessage, Mention, DirectMention]),
            food_trucks,
        )
}

pub fn bot_dispatcher<S, C>(
    food_trucks: FoodTruckQuery<S, C>,
    replier: Arc<dyn Replier>,
) -> EventDispatcher
where
    S: ScheduleSource + 'static,
    C: Clock + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(bot_router(food_trucks), replier.clone()));
    dispatcher.register(ChannelJoinHandler::new(CHANNEL_JOIN_GREETING, replier));
    dispatcher
}
