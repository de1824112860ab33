//! Platform-independent incoming updates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

impl Sender {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Command { message_id: i64, name: String },
    Text { message_id: i64, text: String },
    Contact { message_id: i64, phone_number: String },
    Callback { id: String, message_id: Option<i64>, data: String },
}

/// A user action the conversation reacts to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingUpdate {
    pub chat_id: i64,
    pub sender: Sender,
    pub date: DateTime<Utc>,
    pub event: Event,
}

impl IncomingUpdate {
    /// Text or button data that triggered the update, for error reports
    pub fn describe(&self) -> String {
        match &self.event {
            Event::Command { name, .. } => format!("Message: /{}", name),
            Event::Text { text, .. } => format!("Message: {}", text),
            Event::Contact { phone_number, .. } => format!("Contact: {}", phone_number),
            Event::Callback { data, .. } => format!("Button data: {}", data),
        }
    }

    pub fn callback_data(&self) -> Option<&str> {
        match &self.event {
            Event::Callback { data, .. } => Some(data),
            _ => None,
        }
    }
}

/// Direction of a helpdesk message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelpdeskDirection {
    /// Operator wrote to the user
    Outgoing,
    /// User message mirrored back by the helpdesk
    Incoming,
}

/// Webhook notification from the Chatwoot helpdesk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelpdeskUpdate {
    pub event: String,
    pub direction: Option<HelpdeskDirection>,
    pub content: Option<String>,
    pub chat_id: Option<i64>,
    pub conversation_id: Option<i64>,
}

impl HelpdeskUpdate {
    pub const MESSAGE_CREATED: &'static str = "message_created";

    /// Parse a Chatwoot webhook payload; `None` when the event name is missing
    pub fn from_json(payload: &Value, chat_id_attribute: &str) -> Option<Self> {
        let event = payload.get("event")?.as_str()?.to_string();

        if event != Self::MESSAGE_CREATED {
            return Some(Self {
                event,
                direction: None,
                content: None,
                chat_id: None,
                conversation_id: None,
            });
        }

        let direction = match payload.get("message_type").and_then(Value::as_str) {
            Some("outgoing") => Some(HelpdeskDirection::Outgoing),
            Some("incoming") => Some(HelpdeskDirection::Incoming),
            _ => None,
        };

        let conversation = payload.get("conversation");
        let chat_id = conversation
            .and_then(|c| c.pointer("/meta/sender/custom_attributes"))
            .and_then(|attrs| attrs.get(chat_id_attribute))
            .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())));

        Some(Self {
            event,
            direction,
            content: payload.get("content").and_then(Value::as_str).map(str::to_string),
            chat_id,
            conversation_id: conversation.and_then(|c| c.get("id")).and_then(Value::as_i64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_outgoing_message() {
        let payload = json!({
            "event": "message_created",
            "message_type": "outgoing",
            "content": "Hello from support",
            "conversation": {
                "id": 77,
                "meta": {"sender": {"custom_attributes": {"bot_chat_id": "12345"}}}
            }
        });
        let update = HelpdeskUpdate::from_json(&payload, "bot_chat_id").unwrap();
        assert_eq!(update.direction, Some(HelpdeskDirection::Outgoing));
        assert_eq!(update.chat_id, Some(12345));
        assert_eq!(update.conversation_id, Some(77));
        assert_eq!(update.content.as_deref(), Some("Hello from support"));
    }

    #[test]
    fn other_events_carry_no_message() {
        let payload = json!({"event": "conversation_status_changed", "id": 3});
        let update = HelpdeskUpdate::from_json(&payload, "bot_chat_id").unwrap();
        assert_eq!(update.event, "conversation_status_changed");
        assert!(update.content.is_none());
        assert!(HelpdeskUpdate::from_json(&json!({"foo": 1}), "bot_chat_id").is_none());
    }
}
