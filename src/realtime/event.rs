//! Wire codec for the realtime link. Frames are JSON objects of the form
//! `{"event": "<name>", "data": {...}}` in both directions.

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::models::{Message, Notification};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub chat_id: String,
    pub user_id: String,
}

/// Pushes consumed from the backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "notification:new")]
    NotificationNew(Notification),
    #[serde(rename = "notification:unread-count")]
    UnreadCount(UnreadCount),
    #[serde(rename = "chat:message")]
    MessageNew(Message),
    #[serde(rename = "chat:typing")]
    Typing(TypingEvent),
    #[serde(rename = "chat:stop-typing")]
    StopTyping(TypingEvent),
}

/// Signals emitted towards the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "chat:typing")]
    Typing(TypingEvent),
    #[serde(rename = "chat:stop-typing")]
    StopTyping(TypingEvent),
}

impl ServerEvent {
    pub fn decode(text: &str) -> Result<Self, ClientError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl ClientEvent {
    pub fn encode(&self) -> Result<String, ClientError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_unread_count_push() {
        let ev = ServerEvent::decode(r#"{"event":"notification:unread-count","data":{"count":5}}"#)
            .unwrap();
        match ev {
            ServerEvent::UnreadCount(u) => assert_eq!(u.count, 5),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn decodes_notification_push() {
        let frame = r#"{
            "event": "notification:new",
            "data": {
                "id": "n1",
                "type": "announcement",
                "priority": "high",
                "message": "Gym closes early today",
                "read": false,
                "createdAt": "2026-08-25T10:00:00Z"
            }
        }"#;
        match ServerEvent::decode(frame).unwrap() {
            ServerEvent::NotificationNew(n) => {
                assert_eq!(n.id, "n1");
                assert_eq!(n.kind, "announcement");
                assert!(!n.read);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn unknown_event_is_an_error() {
        assert!(ServerEvent::decode(r#"{"event":"presence:ping","data":{}}"#).is_err());
    }

    #[test]
    fn encodes_typing_signals() {
        let ev = ClientEvent::Typing(TypingEvent {
            chat_id: "c1".into(),
            user_id: "u1".into(),
        });
        assert_eq!(
            ev.encode().unwrap(),
            r#"{"event":"chat:typing","data":{"chatId":"c1","userId":"u1"}}"#
        );

        let stop = ClientEvent::StopTyping(TypingEvent {
            chat_id: "c1".into(),
            user_id: "u1".into(),
        });
        assert!(stop.encode().unwrap().contains("chat:stop-typing"));
    }
}
