use ackbar_core::{
    errors::ScheduleError,
    schedule::{
        format_entries, parse_schedule, Clock, DayOfWeek, LocalClock, ScheduleEntry,
        ScheduleSource,
    },
};
use async_trait::async_trait;
use tracing::{error, info};

use crate::{
    events::{EventContext, MessageEvent},
    hears::{Skill, SkillError},
    reply::Replier,
};

pub const INTRO_REPLY: &str =
    "I have come from the forest moon of Endor to tell you the food trucks for today:";
pub const WEEKEND_REPLY: &str = "Sorry, the Snackbar is closed on the weekends.";

/// Answers "food truck" questions with today's downtown schedule.
pub struct FoodTruckQuery<S, C = LocalClock> {
    source: S,
    clock: C,
    notify_on_failure: bool,
}

impl<S> FoodTruckQuery<S, LocalClock>
where
    S: ScheduleSource,
{
    pub fn new(source: S) -> Self {
        Self::with_clock(source, LocalClock)
    }
}

impl<S, C> FoodTruckQuery<S, C>
where
    S: ScheduleSource,
    C: Clock,
{
    pub fn with_clock(source: S, clock: C) -> Self {
        Self { source, clock, notify_on_failure: false }
    }

    /// When set, a failed lookup is answered with an apology instead of silence.
    pub fn notify_on_failure(mut self, notify: bool) -> Self {
        self.notify_on_failure = notify;
        self
    }

    async fn entries(&self, day: DayOfWeek) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        let html = self.source.fetch().await?;
        Ok(parse_schedule(&html, day)?)
    }
}

#[async_trait]
impl<S, C> Skill for FoodTruckQuery<S, C>
where
    S: ScheduleSource + 'static,
    C: Clock + 'static,
{
    async fn respond(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
        replier: &dyn Replier,
    ) -> Result<(), SkillError> {
        let target = event.reply_target();
        let day = self.clock.today();

        info!(
            event_name = "bot.food_truck.query",
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel_id,
            day = %day,
            "food truck query received"
        );

        if day.is_weekend() {
            replier.reply(&target, WEEKEND_REPLY).await?;
            return Ok(());
        }

        let entries = match self.entries(day).await {
            Ok(entries) => entries,
            Err(schedule_error) => {
                error!(
                    event_name = "bot.food_truck.failed",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %event.channel_id,
                    failure = schedule_error.kind(),
                    error = %schedule_error,
                    "food truck schedule lookup failed"
                );
                if self.notify_on_failure {
                    replier.reply(&target, schedule_error.user_message()).await?;
                }
                return Ok(());
            }
        };

        replier.reply(&target, INTRO_REPLY).await?;
        for line in format_entries(&entries) {
            replier.reply(&target, &line).await?;
        }

        info!(
            event_name = "bot.food_truck.answered",
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel_id,
            entries = entries.len(),
            "food truck schedule sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use ackbar_core::schedule::{DayOfWeek, FetchError, FixedClock, ScheduleSource};
    use async_trait::async_trait;

    use super::{FoodTruckQuery, INTRO_REPLY, WEEKEND_REPLY};
    use crate::events::{EventContext, MessageEvent, MessageKind};
    use crate::hears::Skill;
    use crate::reply::testing::RecordingReplier;
    use crate::testing::capture_logs;

    const TWO_DOWNTOWN_GROUPS: &str = r#"<html><body>
<div>
  <h3>Downtown: City Hall Plaza</h3>
  <p class="supporting-text"><a href="/city-hall">City Hall Plaza</a></p>
  <table><tbody><tr>
    <td data-label="Time period">11am - 3pm</td>
    <td data-label="Monday">Bon Me</td>
    <td data-label="Wednesday">Roxy's Grilled Cheese</td>
  </tr></tbody></table>
</div>
<div class="dr"></div>
<div>
  <h3>Back Bay</h3>
  <p class="supporting-text"><a href="/copley">Copley Square</a></p>
  <table><tbody><tr>
    <td data-label="Time period">11am - 2pm</td>
    <td data-label="Monday">Mei Mei</td>
    <td data-label="Wednesday">Chicken &amp; Rice Guys</td>
  </tr></tbody></table>
</div>
<div class="dr"></div>
<div>
  <h3>Downtown: Greenway</h3>
  <p class="supporting-text"><a href="/dewey">Dewey Square</a></p>
  <table><tbody><tr>
    <td data-label="Time period">11am - 2:30pm</td>
    <td data-label="Monday">Moyzilla</td>
    <td data-label="Wednesday"></td>
  </tr></tbody></table>
</div>
<div class="dr"></div>
</body></html>"#;

    const NO_DOWNTOWN_GROUPS: &str = r#"<html><body>
<div>
  <h3>Back Bay</h3>
  <p class="supporting-text"><a href="/copley">Copley Square</a></p>
  <table><tbody><tr>
    <td data-label="Time period">11am - 2pm</td>
    <td data-label="Monday">Mei Mei</td>
  </tr></tbody></table>
</div>
<div class="dr"></div>
</body></html>"#;

    enum Scripted {
        Page(&'static str),
        Unreachable,
    }

    struct CountingSource {
        script: Scripted,
        calls: Arc<AtomicUsize>,
    }

    impl CountingSource {
        fn new(script: Scripted) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (Self { script, calls: calls.clone() }, calls)
        }
    }

    #[async_trait]
    impl ScheduleSource for CountingSource {
        async fn fetch(&self) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Scripted::Page(html) => Ok(html.to_owned()),
                Scripted::Unreachable => Err(FetchError::Status { status: 503 }),
            }
        }
    }

    fn question() -> MessageEvent {
        MessageEvent {
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            text: "any food trucks today?".to_owned(),
            ts: "1730000000.1000".to_owned(),
            thread_ts: Some("1730000000.0500".to_owned()),
            kind: MessageKind::Mention,
        }
    }

    async fn ask(query: &FoodTruckQuery<CountingSource, FixedClock>) -> RecordingReplier {
        let replier = RecordingReplier::default();
        query.respond(&question(), &EventContext::default(), &replier).await.expect("respond");
        replier
    }

    #[tokio::test]
    async fn weekend_gets_one_closed_reply_and_no_fetch() {
        for day in [DayOfWeek::Saturday, DayOfWeek::Sunday] {
            let (source, calls) = CountingSource::new(Scripted::Page(TWO_DOWNTOWN_GROUPS));
            let query = FoodTruckQuery::with_clock(source, FixedClock(day));

            let replier = ask(&query).await;

            assert_eq!(replier.texts().await, vec![WEEKEND_REPLY]);
            assert_eq!(calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn weekday_lists_downtown_trucks_after_intro() {
        let (source, calls) = CountingSource::new(Scripted::Page(TWO_DOWNTOWN_GROUPS));
        let query = FoodTruckQuery::with_clock(source, FixedClock(DayOfWeek::Monday));

        let replier = ask(&query).await;

        assert_eq!(
            replier.texts().await,
            vec![
                INTRO_REPLY,
                "*City Hall Plaza [_11am - 3pm_]:*",
                "Bon Me",
                "*Dewey Square [_11am - 2:30pm_]:*",
                "Moyzilla",
            ]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn replies_go_to_the_originating_thread() {
        let (source, _) = CountingSource::new(Scripted::Page(TWO_DOWNTOWN_GROUPS));
        let query = FoodTruckQuery::with_clock(source, FixedClock(DayOfWeek::Wednesday));

        let replier = ask(&query).await;
        let sent = replier.sent().await;

        assert_eq!(sent.len(), 5);
        assert!(sent.iter().all(|(target, _)| target.channel_id == "C1"
            && target.thread_ts.as_deref() == Some("1730000000.0500")));
        assert_eq!(sent[4].1, "");
    }

    #[tokio::test]
    async fn no_downtown_groups_sends_only_the_intro() {
        let (source, _) = CountingSource::new(Scripted::Page(NO_DOWNTOWN_GROUPS));
        let query = FoodTruckQuery::with_clock(source, FixedClock(DayOfWeek::Monday));

        let replier = ask(&query).await;

        assert_eq!(replier.texts().await, vec![INTRO_REPLY]);
    }

    #[tokio::test]
    async fn fetch_failure_sends_nothing_by_default() {
        let (logs, _guard) = capture_logs();
        let (source, calls) = CountingSource::new(Scripted::Unreachable);
        let query = FoodTruckQuery::with_clock(source, FixedClock(DayOfWeek::Tuesday));

        let replier = ask(&query).await;

        assert!(replier.sent().await.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let failures = logs.named("bot.food_truck.failed");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0]["level"], "ERROR");
        assert_eq!(failures[0]["fields"]["failure"], "fetch");
    }

    #[tokio::test]
    async fn fetch_failure_can_be_reported_to_the_channel() {
        let (source, _) = CountingSource::new(Scripted::Unreachable);
        let query = FoodTruckQuery::with_clock(source, FixedClock(DayOfWeek::Tuesday))
            .notify_on_failure(true);

        let replier = ask(&query).await;

        assert_eq!(
            replier.texts().await,
            vec!["I couldn't get the food truck schedule right now. Try again later."]
        );
    }

    #[tokio::test]
    async fn restructured_page_is_treated_as_a_failure() {
        let (source, _) = CountingSource::new(Scripted::Page("<html><body>Moved</body></html>"));
        let query = FoodTruckQuery::with_clock(source, FixedClock(DayOfWeek::Monday));

        let replier = ask(&query).await;

        assert!(replier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn reply_failures_propagate() {
        let (source, _) = CountingSource::new(Scripted::Page(TWO_DOWNTOWN_GROUPS));
        let query = FoodTruckQuery::with_clock(source, FixedClock(DayOfWeek::Monday));
        let replier = RecordingReplier::failing();

        let result = query.respond(&question(), &EventContext::default(), &replier).await;

        assert!(result.is_err());
    }
}
