//! Decoding of raw websocket frames into [`SlackEnvelope`]s.
//!
//! Socket Mode wraps each event in an envelope that must be acknowledged.
//! The legacy RTM stream sends bare events with no envelope id, so one is
//! derived from the event timestamp.

use serde_json::Value;
use thiserror::Error;

use crate::events::{ChannelJoinEvent, MessageEvent, MessageKind, SlackEnvelope, SlackEvent};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("websocket frame is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("websocket frame is missing `{0}`")]
    MissingField(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Hello,
    Disconnect { reason: String },
    Envelope(SlackEnvelope),
    Ignored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    SocketMode,
    Rtm,
}

impl Dialect {
    pub fn parse_frame(self, raw: &str, bot_user_id: &str) -> Result<Frame, WireError> {
        match self {
            Self::SocketMode => parse_socket_mode_frame(raw, bot_user_id),
            Self::Rtm => parse_rtm_frame(raw, bot_user_id),
        }
    }
}

pub fn parse_socket_mode_frame(raw: &str, bot_user_id: &str) -> Result<Frame, WireError> {
    let frame: Value = serde_json::from_str(raw)?;
    let frame_type = str_field(&frame, "type").unwrap_or_default();

    match frame_type {
        "hello" => return Ok(Frame::Hello),
        "disconnect" => {
            let reason = str_field(&frame, "reason").unwrap_or("unspecified").to_owned();
            return Ok(Frame::Disconnect { reason });
        }
        _ => {}
    }

    let envelope_id =
        str_field(&frame, "envelope_id").ok_or(WireError::MissingField("envelope_id"))?.to_owned();
    let event = match (frame_type, frame.pointer("/payload/event")) {
        ("events_api", Some(event)) => decode_event(event, bot_user_id, Dialect::SocketMode),
        _ => SlackEvent::Unsupported { event_type: frame_type.to_owned() },
    };

    Ok(Frame::Envelope(SlackEnvelope { envelope_id, event }))
}

pub fn parse_rtm_frame(raw: &str, bot_user_id: &str) -> Result<Frame, WireError> {
    let frame: Value = serde_json::from_str(raw)?;

    match str_field(&frame, "type") {
        Some("hello") => Ok(Frame::Hello),
        Some("goodbye") => Ok(Frame::Disconnect { reason: "goodbye".to_owned() }),
        Some("message") | Some("member_joined_channel") => {
            let stamp = str_field(&frame, "ts")
                .or_else(|| str_field(&frame, "event_ts"))
                .unwrap_or("unknown");
            Ok(Frame::Envelope(SlackEnvelope {
                envelope_id: format!("rtm-{stamp}"),
                event: decode_event(&frame, bot_user_id, Dialect::Rtm),
            }))
        }
        _ => Ok(Frame::Ignored),
    }
}

fn decode_event(event: &Value, bot_user_id: &str, dialect: Dialect) -> SlackEvent {
    let event_type = str_field(event, "type").unwrap_or("unknown");

    match event_type {
        "message" => decode_message(event, bot_user_id, dialect, false),
        "app_mention" => decode_message(event, bot_user_id, dialect, true),
        "member_joined_channel" => {
            let user_id = str_field(event, "user").unwrap_or_default();
            let channel_id = str_field(event, "channel").unwrap_or_default();
            if user_id == bot_user_id && !channel_id.is_empty() {
                SlackEvent::BotChannelJoin(ChannelJoinEvent {
                    channel_id: channel_id.to_owned(),
                    user_id: user_id.to_owned(),
                })
            } else {
                SlackEvent::Unsupported { event_type: "member_joined_channel.other".to_owned() }
            }
        }
        other => SlackEvent::Unsupported { event_type: other.to_owned() },
    }
}

fn decode_message(
    event: &Value,
    bot_user_id: &str,
    dialect: Dialect,
    app_mention: bool,
) -> SlackEvent {
    if let Some(subtype) = str_field(event, "subtype") {
        return SlackEvent::Unsupported { event_type: format!("message.{subtype}") };
    }
    if event.get("bot_id").is_some() {
        return SlackEvent::Unsupported { event_type: "message.bot".to_owned() };
    }

    let (Some(channel_id), Some(user_id), Some(text)) =
        (str_field(event, "channel"), str_field(event, "user"), str_field(event, "text"))
    else {
        return SlackEvent::Unsupported { event_type: "message.incomplete".to_owned() };
    };
    if user_id == bot_user_id {
        return SlackEvent::Unsupported { event_type: "message.self".to_owned() };
    }

    let (kind, text) = classify(channel_id, text, bot_user_id);
    // Socket Mode delivers channel mentions twice: once as `message`, once
    // as `app_mention`. Only the latter is answered.
    if dialect == Dialect::SocketMode
        && !app_mention
        && matches!(kind, MessageKind::Mention | MessageKind::DirectMention)
    {
        return SlackEvent::Unsupported { event_type: "message.mention".to_owned() };
    }

    SlackEvent::Message(MessageEvent {
        channel_id: channel_id.to_owned(),
        user_id: user_id.to_owned(),
        text,
        ts: str_field(event, "ts").unwrap_or_default().to_owned(),
        thread_ts: str_field(event, "thread_ts").map(str::to_owned),
        kind,
    })
}

/// Works out how a message addresses the bot. Direct mentions lose their
/// leading `<@BOT>` prefix (and an optional colon) so triggers see only the
/// request itself.
pub fn classify(channel_id: &str, text: &str, bot_user_id: &str) -> (MessageKind, String) {
    if channel_id.starts_with('D') {
        return (MessageKind::DirectMessage, text.to_owned());
    }

    let trimmed = text.trim_start();
    if let Some(rest) = strip_mention(trimmed, bot_user_id) {
        let rest = rest.trim_start().trim_start_matches(':').trim_start();
        return (MessageKind::DirectMention, rest.to_owned());
    }

    let mention = format!("<@{bot_user_id}");
    let mentioned = trimmed
        .match_indices(&mention)
        .any(|(index, _)| strip_mention(&trimmed[index..], bot_user_id).is_some());
    if mentioned {
        (MessageKind::Mention, text.to_owned())
    } else {
        (MessageKind::Ambient, text.to_owned())
    }
}

/// Strips `<@BOT>` or `<@BOT|name>` from the start of `text`.
fn strip_mention<'a>(text: &'a str, bot_user_id: &str) -> Option<&'a str> {
    let rest = text.strip_prefix("<@")?.strip_prefix(bot_user_id)?;
    if let Some(rest) = rest.strip_prefix('>') {
        return Some(rest);
    }
    let rest = rest.strip_prefix('|')?;
    let close = rest.find('>')?;
    Some(&rest[close + 1..])
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{classify, parse_rtm_frame, parse_socket_mode_frame, Frame};
    use crate::events::{MessageKind, SlackEvent};

    fn envelope_event(frame: Frame) -> SlackEvent {
        match frame {
            Frame::Envelope(envelope) => envelope.event,
            other => panic!("expected envelope, got {other:?}"),
        }
    }

    #[test]
    fn classifies_direct_messages_by_channel() {
        assert_eq!(
            classify("D123", "trucks?", "UBOT"),
            (MessageKind::DirectMessage, "trucks?".to_owned())
        );
    }

    #[test]
    fn strips_leading_mention_for_direct_mentions() {
        assert_eq!(
            classify("C1", "<@UBOT>: food truck?", "UBOT"),
            (MessageKind::DirectMention, "food truck?".to_owned())
        );
        assert_eq!(
            classify("C1", "<@UBOT|ackbar> tlj", "UBOT"),
            (MessageKind::DirectMention, "tlj".to_owned())
        );
    }

    #[test]
    fn mention_later_in_text_is_a_plain_mention() {
        assert_eq!(
            classify("C1", "hey <@UBOT> trucks?", "UBOT"),
            (MessageKind::Mention, "hey <@UBOT> trucks?".to_owned())
        );
    }

    #[test]
    fn other_users_mentions_are_ambient() {
        assert_eq!(classify("C1", "<@UBOTTY> trucks?", "UBOT").0, MessageKind::Ambient);
        assert_eq!(classify("C1", "trucks?", "UBOT").0, MessageKind::Ambient);
    }

    #[test]
    fn socket_mode_hello_and_disconnect() {
        let hello = parse_socket_mode_frame(r#"{"type":"hello"}"#, "UBOT").expect("hello");
        assert_eq!(hello, Frame::Hello);
        assert_eq!(
            parse_socket_mode_frame(r#"{"type":"disconnect","reason":"refresh_requested"}"#, "UBOT")
                .expect("disconnect"),
            Frame::Disconnect { reason: "refresh_requested".to_owned() }
        );
    }

    #[test]
    fn socket_mode_app_mention_becomes_message_event() {
        let raw = json!({
            "envelope_id": "env-1",
            "type": "events_api",
            "payload": { "event": {
                "type": "app_mention",
                "channel": "C1",
                "user": "U1",
                "text": "<@UBOT> food truck",
                "ts": "1730000000.1000"
            }}
        })
        .to_string();

        let frame = parse_socket_mode_frame(&raw, "UBOT").expect("frame");
        let Frame::Envelope(envelope) = frame else { panic!("expected envelope") };

        assert_eq!(envelope.envelope_id, "env-1");
        let SlackEvent::Message(message) = envelope.event else { panic!("expected message") };
        assert_eq!(message.kind, MessageKind::DirectMention);
        assert_eq!(message.text, "food truck");
        assert_eq!(message.thread_ts, None);
    }

    #[test]
    fn socket_mode_skips_duplicate_mention_messages() {
        let raw = json!({
            "envelope_id": "env-2",
            "type": "events_api",
            "payload": { "event": {
                "type": "message",
                "channel": "C1",
                "user": "U1",
                "text": "<@UBOT> trucks",
                "ts": "1"
            }}
        })
        .to_string();

        let event = envelope_event(parse_socket_mode_frame(&raw, "UBOT").expect("frame"));

        assert_eq!(event, SlackEvent::Unsupported { event_type: "message.mention".to_owned() });
    }

    #[test]
    fn socket_mode_non_event_envelopes_still_carry_ids() {
        let raw = r#"{"envelope_id":"env-3","type":"slash_commands","payload":{}}"#;

        let frame = parse_socket_mode_frame(raw, "UBOT").expect("frame");
        let Frame::Envelope(envelope) = frame else { panic!("expected envelope") };

        assert_eq!(envelope.envelope_id, "env-3");
        assert!(matches!(envelope.event, SlackEvent::Unsupported { .. }));
    }

    #[test]
    fn bot_and_subtype_messages_are_not_answered() {
        let bot = json!({
            "type": "message", "channel": "C1", "bot_id": "B1", "text": "trucks", "ts": "1"
        })
        .to_string();
        let edited = json!({
            "type": "message", "subtype": "message_changed", "channel": "C1", "ts": "1"
        })
        .to_string();

        assert!(matches!(
            envelope_event(parse_rtm_frame(&bot, "UBOT").expect("bot")),
            SlackEvent::Unsupported { .. }
        ));
        assert_eq!(
            envelope_event(parse_rtm_frame(&edited, "UBOT").expect("edited")),
            SlackEvent::Unsupported { event_type: "message.message_changed".to_owned() }
        );
    }

    #[test]
    fn rtm_messages_keep_mentions_and_threads() {
        let raw = json!({
            "type": "message",
            "channel": "C1",
            "user": "U1",
            "text": "where are the trucks <@UBOT>",
            "ts": "1730000000.2000",
            "thread_ts": "1730000000.1000"
        })
        .to_string();

        let frame = parse_rtm_frame(&raw, "UBOT").expect("frame");
        let Frame::Envelope(envelope) = frame else { panic!("expected envelope") };

        assert_eq!(envelope.envelope_id, "rtm-1730000000.2000");
        let SlackEvent::Message(message) = envelope.event else { panic!("expected message") };
        assert_eq!(message.kind, MessageKind::Mention);
        assert_eq!(message.thread_ts.as_deref(), Some("1730000000.1000"));
    }

    #[test]
    fn bot_joining_a_channel_is_recognised() {
        let joined =
            r#"{"type":"member_joined_channel","user":"UBOT","channel":"C7","event_ts":"9"}"#;
        let someone_else = r#"{"type":"member_joined_channel","user":"U2","channel":"C7"}"#;

        assert!(matches!(
            envelope_event(parse_rtm_frame(joined, "UBOT").expect("join")),
            SlackEvent::BotChannelJoin(ref event) if event.channel_id == "C7"
        ));
        assert!(matches!(
            envelope_event(parse_rtm_frame(someone_else, "UBOT").expect("join")),
            SlackEvent::Unsupported { .. }
        ));
    }

    #[test]
    fn rtm_noise_is_ignored() {
        let typing = parse_rtm_frame(r#"{"type":"user_typing"}"#, "UBOT").expect("typing");
        let reply_ack = parse_rtm_frame(r#"{"ok":true,"reply_to":1}"#, "UBOT").expect("ack");

        assert_eq!(typing, Frame::Ignored);
        assert_eq!(reply_ack, Frame::Ignored);
        assert_eq!(
            parse_rtm_frame(r#"{"type":"goodbye"}"#, "UBOT").expect("goodbye"),
            Frame::Disconnect { reason: "goodbye".to_owned() }
        );
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(parse_rtm_frame("not json", "UBOT").is_err());
        assert!(parse_socket_mode_frame(r#"{"type":"events_api"}"#, "UBOT").is_err());
    }
}
