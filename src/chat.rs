//! Client-held chat state: an in-memory cache synchronized by REST fetches
//! plus incremental pushes, and the outbound typing-indicator debounce.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::models::{Attachment, Chat, Message};
use crate::realtime::event::{ClientEvent, TypingEvent};

/// Messages are kept in arrival order only. An optimistic append and the
/// backend's echo of the same send are NOT deduplicated; that mirrors the
/// backend contract, which never promises stable ids before the echo.
#[derive(Default)]
pub struct ChatStore {
    chats: Vec<Chat>,
    messages: HashMap<String, Vec<Message>>,
    peer_typing: HashMap<String, bool>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full refresh from REST; replaces the cached list outright.
    pub fn replace_chats(&mut self, chats: Vec<Chat>) {
        self.chats = chats;
    }

    pub fn replace_messages(&mut self, chat_id: &str, messages: Vec<Message>) {
        self.messages.insert(chat_id.to_string(), messages);
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn messages(&self, chat_id: &str) -> &[Message] {
        self.messages.get(chat_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Optimistic append on send, before the backend echoes the message.
    pub fn append_local(
        &mut self,
        chat_id: &str,
        sender_id: &str,
        content: &str,
        attachment: Option<Attachment>,
    ) -> Message {
        let message = Message {
            id: format!("local-{}", Uuid::new_v4()),
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            attachment,
            created_at: Utc::now(),
        };
        self.messages
            .entry(chat_id.to_string())
            .or_default()
            .push(message.clone());
        message
    }

    /// Push from the socket; appended in arrival order.
    pub fn apply_incoming(&mut self, message: Message) {
        self.messages
            .entry(message.chat_id.clone())
            .or_default()
            .push(message);
    }

    pub fn set_peer_typing(&mut self, chat_id: &str, typing: bool) {
        self.peer_typing.insert(chat_id.to_string(), typing);
    }

    pub fn peer_typing(&self, chat_id: &str) -> bool {
        self.peer_typing.get(chat_id).copied().unwrap_or(false)
    }
}

struct TypingState {
    generation: u64,
    typing: bool,
}

/// Outbound typing debounce for one open conversation. The first keystroke
/// emits `chat:typing`; every keystroke re-arms a single-shot quiet timer, and
/// `chat:stop-typing` goes out once the timer survives untouched. Stale timers
/// are cancelled by the generation check, never left to overlap.
pub struct TypingTracker {
    chat_id: String,
    user_id: String,
    outbound: mpsc::Sender<ClientEvent>,
    quiet_after: Duration,
    state: Arc<Mutex<TypingState>>,
}

impl TypingTracker {
    pub fn new(
        chat_id: impl Into<String>,
        user_id: impl Into<String>,
        outbound: mpsc::Sender<ClientEvent>,
        quiet_after: Duration,
    ) -> Self {
        TypingTracker {
            chat_id: chat_id.into(),
            user_id: user_id.into(),
            outbound,
            quiet_after,
            state: Arc::new(Mutex::new(TypingState { generation: 0, typing: false })),
        }
    }

    fn event(&self) -> TypingEvent {
        TypingEvent {
            chat_id: self.chat_id.clone(),
            user_id: self.user_id.clone(),
        }
    }

    /// Call on every local keystroke.
    pub async fn keystroke(&self) {
        let (generation, first) = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            let first = !state.typing;
            state.typing = true;
            (state.generation, first)
        };

        if first {
            let _ = self.outbound.send(ClientEvent::Typing(self.event())).await;
        }

        let state = Arc::clone(&self.state);
        let outbound = self.outbound.clone();
        let quiet_after = self.quiet_after;
        let event = self.event();
        tokio::spawn(async move {
            tokio::time::sleep(quiet_after).await;
            let mut state = state.lock().await;
            // A later keystroke re-armed the timer; this one is stale.
            if state.generation != generation || !state.typing {
                return;
            }
            state.typing = false;
            drop(state);
            let _ = outbound.send(ClientEvent::StopTyping(event)).await;
        });
    }

    /// Sending the message ends the typing state immediately.
    pub async fn message_sent(&self) {
        let was_typing = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            std::mem::replace(&mut state.typing, false)
        };
        if was_typing {
            let _ = self.outbound.send(ClientEvent::StopTyping(self.event())).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    fn message(id: &str, chat_id: &str) -> Message {
        Message {
            id: id.into(),
            chat_id: chat_id.into(),
            sender_id: "peer".into(),
            content: "hi".into(),
            attachment: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn incoming_messages_keep_arrival_order() {
        let mut store = ChatStore::new();
        store.apply_incoming(message("m2", "c1"));
        store.apply_incoming(message("m1", "c1"));
        let ids: Vec<&str> = store.messages("c1").iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m1"]);
    }

    #[test]
    fn optimistic_send_and_echo_both_survive() {
        let mut store = ChatStore::new();
        store.append_local("c1", "me", "hello", None);
        // Backend echoes the same send with its own id.
        store.apply_incoming(message("m1", "c1"));
        assert_eq!(store.messages("c1").len(), 2);
    }

    #[test]
    fn peer_typing_flag_follows_events() {
        let mut store = ChatStore::new();
        assert!(!store.peer_typing("c1"));
        store.set_peer_typing("c1", true);
        assert!(store.peer_typing("c1"));
        store.set_peer_typing("c1", false);
        assert!(!store.peer_typing("c1"));
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_typing_emitted_after_quiet_window() {
        let (tx, mut rx) = mpsc::channel(8);
        let tracker = TypingTracker::new("c1", "u1", tx, Duration::from_millis(2000));

        tracker.keystroke().await;
        assert!(matches!(rx.try_recv(), Ok(ClientEvent::Typing(_))));

        tokio::time::advance(Duration::from_millis(1999)).await;
        settle().await;
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert!(matches!(rx.try_recv(), Ok(ClientEvent::StopTyping(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn keystroke_within_window_rearms_the_timer() {
        let (tx, mut rx) = mpsc::channel(8);
        let tracker = TypingTracker::new("c1", "u1", tx, Duration::from_millis(2000));

        tracker.keystroke().await;
        assert!(matches!(rx.try_recv(), Ok(ClientEvent::Typing(_))));

        tokio::time::advance(Duration::from_millis(1500)).await;
        settle().await;
        tracker.keystroke().await;
        // Second keystroke while already typing emits nothing.
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);

        // 2000ms after the FIRST keystroke: still quiet.
        tokio::time::advance(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);

        // 2000ms after the LAST keystroke: stop goes out.
        tokio::time::advance(Duration::from_millis(1500)).await;
        settle().await;
        assert!(matches!(rx.try_recv(), Ok(ClientEvent::StopTyping(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn message_sent_stops_typing_immediately() {
        let (tx, mut rx) = mpsc::channel(8);
        let tracker = TypingTracker::new("c1", "u1", tx, Duration::from_millis(2000));

        tracker.keystroke().await;
        let _ = rx.try_recv();
        tracker.message_sent().await;
        assert!(matches!(rx.try_recv(), Ok(ClientEvent::StopTyping(_))));

        // The stale quiet timer must not fire a second stop.
        tokio::time::advance(Duration::from_millis(2000)).await;
        settle().await;
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }
}
