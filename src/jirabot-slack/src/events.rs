//! Event handling for Slack events.
//!
//! Only `message` events are of interest: plain channel messages from
//! people, and `bot_message` posts from the Jira Slack app which may be
//! replaced by the bot's own summary.
//!
//! Events are received via the Socket Mode WebSocket connection.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SlackError, SlackResult};

/// Subtype Slack uses for messages posted by bots and integrations.
pub const BOT_MESSAGE_SUBTYPE: &str = "bot_message";

/// Slack event types that we handle.
#[derive(Debug, Clone)]
pub enum SlackEvent {
    /// Channel message event.
    Message(MessageEvent),
    /// Any other event type (for forward compatibility).
    Unknown,
}

/// Legacy attachment found on incoming messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageAttachment {
    /// Attachment title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Link behind the attachment title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    /// Fallback text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

/// Event payload for messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Event type (always "message" for this struct).
    #[serde(rename = "type", default = "default_message_type")]
    pub event_type: String,
    /// User who sent the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Text of the message (absent for some subtypes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Channel where the message was sent.
    pub channel: String,
    /// Timestamp of the message.
    #[serde(default)]
    pub ts: String,
    /// Thread timestamp (if in a thread).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    /// Subtype of message (e.g., "bot_message").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Bot ID (if message is from a bot).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    /// Attachments of the message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<MessageAttachment>,
}

fn default_message_type() -> String {
    "message".to_string()
}

impl MessageEvent {
    /// Create a plain user message (mostly useful for tests and tooling).
    pub fn user_message(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            event_type: default_message_type(),
            user: Some("U00000000".to_string()),
            text: Some(text.into()),
            channel: channel.into(),
            ts: String::new(),
            thread_ts: None,
            subtype: None,
            bot_id: None,
            attachments: Vec::new(),
        }
    }

    /// Check if this is a bot message.
    ///
    /// Posts made through `chat.postMessage` with a bot token carry a
    /// `bot_id` but no `bot_message` subtype.
    pub fn is_bot_message(&self) -> bool {
        self.subtype.as_deref() == Some(BOT_MESSAGE_SUBTYPE) || self.bot_id.is_some()
    }

    /// Check if this message should be scanned for issue references.
    ///
    /// Only `message` events with text that were not posted by a bot qualify.
    pub fn is_processable(&self) -> bool {
        self.event_type == "message"
            && self.text.as_deref().is_some_and(|t| !t.is_empty())
            && !self.is_bot_message()
    }

    /// Title link of the first attachment of a bot message, if any.
    ///
    /// This is where the Jira Slack app puts the issue URL.
    pub fn bot_attachment_link(&self) -> Option<&str> {
        if !self.is_bot_message() {
            return None;
        }
        self.attachments.first()?.title_link.as_deref()
    }
}

/// Socket Mode envelope wrapping events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketModeEnvelope {
    /// Envelope ID for acknowledgment (absent on `hello`).
    #[serde(default)]
    pub envelope_id: String,
    /// Type of payload.
    #[serde(rename = "type")]
    pub envelope_type: String,
    /// Actual payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<EventPayload>,
}

/// Event callback payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    /// Team ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    /// The actual event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<serde_json::Value>,
    /// Event ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// Socket Mode acknowledgment response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketModeAck {
    /// Envelope ID being acknowledged.
    pub envelope_id: String,
}

impl SocketModeAck {
    /// Create a simple acknowledgment.
    pub fn new(envelope_id: impl Into<String>) -> Self {
        Self {
            envelope_id: envelope_id.into(),
        }
    }
}

/// Trait for handling Slack events.
#[async_trait::async_trait]
pub trait SlackEventHandler: Send + Sync {
    /// Handle a channel message event.
    async fn handle_message(&self, event: MessageEvent) -> SlackResult<()>;
}

/// Parse a raw event from the Socket Mode envelope.
pub fn parse_event(payload: &EventPayload) -> SlackResult<SlackEvent> {
    let event_json = payload
        .event
        .as_ref()
        .ok_or_else(|| SlackError::InvalidPayload("Missing event field".to_string()))?;

    let event_type = event_json
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("unknown");

    debug!("Parsing event type: {}", event_type);

    match event_type {
        "message" => {
            let event: MessageEvent = serde_json::from_value(event_json.clone())?;
            Ok(SlackEvent::Message(event))
        }
        _ => Ok(SlackEvent::Unknown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(event: serde_json::Value) -> EventPayload {
        EventPayload {
            team_id: Some("T11111".to_string()),
            event: Some(event),
            event_id: None,
        }
    }

    #[test]
    fn test_parse_message_event() {
        let event = parse_event(&payload(serde_json::json!({
            "type": "message",
            "user": "U12345",
            "text": "look at ABC-12",
            "channel": "C12345",
            "ts": "1234567890.123456"
        })))
        .unwrap();

        let SlackEvent::Message(message) = event else {
            panic!("expected a message event");
        };
        assert_eq!(message.text.as_deref(), Some("look at ABC-12"));
        assert_eq!(message.channel, "C12345");
        assert!(message.is_processable());
    }

    #[test]
    fn test_parse_unknown_event() {
        let event = parse_event(&payload(serde_json::json!({
            "type": "reaction_added",
            "user": "U12345"
        })))
        .unwrap();
        assert!(matches!(event, SlackEvent::Unknown));
    }

    #[test]
    fn test_parse_event_missing_event_field() {
        let result = parse_event(&EventPayload {
            team_id: None,
            event: None,
            event_id: None,
        });
        assert!(matches!(result, Err(SlackError::InvalidPayload(_))));
    }

    #[test]
    fn test_bot_message_is_not_processable() {
        let mut event = MessageEvent::user_message("C1", "ABC-1");
        event.subtype = Some(BOT_MESSAGE_SUBTYPE.to_string());
        assert!(event.is_bot_message());
        assert!(!event.is_processable());
    }

    #[test]
    fn test_message_with_bot_id_is_not_processable() {
        let event: MessageEvent = serde_json::from_value(serde_json::json!({
            "type": "message",
            "user": "U0BOT",
            "bot_id": "B0BOT",
            "text": "*<https://jira.example.com/browse/ABC-1|ABC-1>*: Summary",
            "channel": "C1",
            "ts": "1.3"
        }))
        .unwrap();

        assert!(event.subtype.is_none());
        assert!(event.is_bot_message());
        assert!(!event.is_processable());
    }

    #[test]
    fn test_message_without_text_is_not_processable() {
        let mut event = MessageEvent::user_message("C1", "");
        assert!(!event.is_processable());

        event.text = None;
        assert!(!event.is_processable());
    }

    #[test]
    fn test_other_subtypes_are_processable() {
        let mut event = MessageEvent::user_message("C1", "ABC-1");
        event.subtype = Some("thread_broadcast".to_string());
        assert!(event.is_processable());
    }

    #[test]
    fn test_bot_attachment_link() {
        let event: MessageEvent = serde_json::from_value(serde_json::json!({
            "type": "message",
            "subtype": "bot_message",
            "bot_id": "B1",
            "channel": "C1",
            "ts": "1.2",
            "attachments": [
                {"title": "ABC-7: Broken login", "title_link": "https://jira.example.com/browse/ABC-7"}
            ]
        }))
        .unwrap();

        assert_eq!(
            event.bot_attachment_link(),
            Some("https://jira.example.com/browse/ABC-7")
        );

        let user_event = MessageEvent {
            subtype: None,
            bot_id: None,
            ..event
        };
        assert_eq!(user_event.bot_attachment_link(), None);
    }

    #[test]
    fn test_socket_mode_ack() {
        let ack = SocketModeAck::new("env-123");
        assert_eq!(
            serde_json::to_value(&ack).unwrap(),
            serde_json::json!({"envelope_id": "env-123"})
        );
    }

    #[test]
    fn test_hello_envelope_without_id() {
        let envelope: SocketModeEnvelope =
            serde_json::from_str(r#"{"type": "hello", "num_connections": 1}"#).unwrap();
        assert_eq!(envelope.envelope_type, "hello");
        assert!(envelope.envelope_id.is_empty());
        assert!(envelope.payload.is_none());
    }
}
