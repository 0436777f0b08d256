//! Realtime link to the backend: a connection-supervisor task that owns the
//! single WebSocket transport for the session. Connects only while a session
//! exists, reconnects a bounded number of times with capped backoff, and tears
//! down deterministically on logout. Callers never touch the transport; they
//! hand outbound events to a channel and read state from the shared stores.

pub mod event;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::chat::ChatStore;
use crate::config::Config;
use crate::notify::NotificationFeed;
use crate::realtime::event::{ClientEvent, ServerEvent};
use crate::session::{AuthSession, SessionHandle};

#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn from_config(config: &Config) -> Self {
        ReconnectPolicy {
            max_attempts: config.reconnect_max_attempts,
            base_delay: Duration::from_millis(config.reconnect_base_delay_ms),
            max_delay: Duration::from_millis(config.reconnect_max_delay_ms),
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based): exponential from
    /// the base, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }
}

/// Applies inbound pushes to the client-held stores. Deactivated on logout so
/// a late frame can never mutate state after the session ended.
pub struct EventRouter {
    chats: Arc<Mutex<ChatStore>>,
    notifications: Arc<Mutex<NotificationFeed>>,
    active: AtomicBool,
}

impl EventRouter {
    pub fn new(chats: Arc<Mutex<ChatStore>>, notifications: Arc<Mutex<NotificationFeed>>) -> Self {
        EventRouter {
            chats,
            notifications,
            active: AtomicBool::new(true),
        }
    }

    pub fn shutdown(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub async fn route(&self, event: ServerEvent) {
        if !self.is_active() {
            tracing::debug!("dropping push received after disconnect");
            return;
        }
        match event {
            ServerEvent::NotificationNew(n) => self.notifications.lock().await.push(n),
            ServerEvent::UnreadCount(u) => self.notifications.lock().await.set_unread(u.count),
            ServerEvent::MessageNew(m) => self.chats.lock().await.apply_incoming(m),
            ServerEvent::Typing(t) => self.chats.lock().await.set_peer_typing(&t.chat_id, true),
            ServerEvent::StopTyping(t) => self.chats.lock().await.set_peer_typing(&t.chat_id, false),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LinkEnd {
    SessionEnded,
    TransportDropped,
}

pub struct SocketSupervisor {
    ws_url: String,
    session: SessionHandle,
    router: Arc<EventRouter>,
    policy: ReconnectPolicy,
    outbound_rx: mpsc::Receiver<ClientEvent>,
    // Keeps the channel open even when every caller-side sender is dropped.
    _outbound_keepalive: mpsc::Sender<ClientEvent>,
}

impl SocketSupervisor {
    pub fn new(
        config: &Config,
        session: SessionHandle,
        router: Arc<EventRouter>,
    ) -> (Self, mpsc::Sender<ClientEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let supervisor = SocketSupervisor {
            ws_url: config.ws_url.clone(),
            session,
            router,
            policy: ReconnectPolicy::from_config(config),
            outbound_rx: rx,
            _outbound_keepalive: tx.clone(),
        };
        (supervisor, tx)
    }

    /// Supervision loop. Runs for the lifetime of the process; returns only if
    /// the session handle itself is gone.
    pub async fn run(mut self) {
        let mut sessions = self.session.subscribe();
        loop {
            // Wait until authenticated.
            let token = loop {
                let current = sessions.borrow_and_update().as_ref().map(|s| s.token.clone());
                if let Some(token) = current {
                    break token;
                }
                if sessions.changed().await.is_err() {
                    return;
                }
            };
            self.router.resume();

            let mut attempt: u32 = 0;
            loop {
                match connect_async(self.handshake_url(&token)).await {
                    Ok((stream, _resp)) => {
                        tracing::info!("realtime socket connected");
                        attempt = 0;
                        match self.drive(stream, &mut sessions, &token).await {
                            LinkEnd::SessionEnded => {
                                // drive deactivated the router before returning
                                tracing::info!("realtime socket disconnected");
                                break;
                            }
                            LinkEnd::TransportDropped => {
                                tracing::warn!("realtime transport dropped");
                            }
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "realtime connect failed"),
                }

                // Re-check the session before any retry.
                match sessions.borrow_and_update().as_ref().map(|s| s.token.clone()) {
                    Some(t) if t == token => {}
                    Some(_) => break, // new session, reconnect with its token
                    None => {
                        self.router.shutdown();
                        break;
                    }
                }

                attempt += 1;
                if attempt > self.policy.max_attempts {
                    tracing::warn!(
                        attempts = self.policy.max_attempts,
                        "reconnect attempts exhausted; waiting for session change"
                    );
                    if sessions.changed().await.is_err() {
                        return;
                    }
                    break;
                }
                // A logout landing during backoff must not wait out the timer
                // and reconnect once more with the stale token.
                tokio::select! {
                    _ = tokio::time::sleep(self.policy.delay(attempt)) => {}
                    changed = sessions.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        if sessions.borrow_and_update().is_none() {
                            self.router.shutdown();
                        }
                        break;
                    }
                }
            }
        }
    }

    fn handshake_url(&self, token: &str) -> String {
        let sep = if self.ws_url.contains('?') { '&' } else { '?' };
        format!("{}{}token={}", self.ws_url, sep, token)
    }

    /// Drives one live connection. The select is biased with the session
    /// branch first: when a logout and an inbound frame are ready at the same
    /// time, the logout always wins and the router is deactivated before this
    /// returns, so no frame can be routed after the session ended.
    async fn drive<T>(
        &mut self,
        stream: T,
        sessions: &mut watch::Receiver<Option<AuthSession>>,
        token: &str,
    ) -> LinkEnd
    where
        T: Stream<Item = Result<WsMessage, WsError>> + Sink<WsMessage> + Unpin,
    {
        let (mut sink, mut source) = stream.split();
        loop {
            tokio::select! {
                biased;
                changed = sessions.changed() => {
                    if changed.is_err() {
                        self.router.shutdown();
                        return LinkEnd::SessionEnded;
                    }
                    let same = sessions
                        .borrow_and_update()
                        .as_ref()
                        .map(|s| s.token == token)
                        .unwrap_or(false);
                    if !same {
                        self.router.shutdown();
                        let _ = sink.send(WsMessage::Close(None)).await;
                        return LinkEnd::SessionEnded;
                    }
                }
                outbound = self.outbound_rx.recv() => {
                    // The keepalive sender means recv never yields None.
                    if let Some(ev) = outbound {
                        match ev.encode() {
                            Ok(text) => {
                                if sink.send(WsMessage::Text(text)).await.is_err() {
                                    return LinkEnd::TransportDropped;
                                }
                            }
                            Err(e) => tracing::debug!(error = %e, "dropping unencodable outbound event"),
                        }
                    }
                }
                inbound = source.next() => {
                    match inbound {
                        Some(Ok(WsMessage::Text(text))) => match ServerEvent::decode(&text) {
                            Ok(ev) => self.router.route(ev).await,
                            Err(e) => tracing::debug!(error = %e, "ignoring unrecognized frame"),
                        },
                        Some(Ok(WsMessage::Close(_))) | None => return LinkEnd::TransportDropped,
                        Some(Ok(_)) => {} // ping/pong/binary are transport noise
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "socket read error");
                            return LinkEnd::TransportDropped;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Notification, NotificationPriority};
    use crate::notify::NotificationFeed;
    use chrono::Utc;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
        }
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let p = policy();
        let delays: Vec<u64> = (1..=5).map(|a| p.delay(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000]);
    }

    #[test]
    fn backoff_does_not_overflow_on_large_attempts() {
        let p = policy();
        assert_eq!(p.delay(1000), Duration::from_millis(5000));
    }

    fn push(n: u32) -> ServerEvent {
        ServerEvent::UnreadCount(event::UnreadCount { count: n })
    }

    fn notification(id: &str) -> ServerEvent {
        ServerEvent::NotificationNew(Notification {
            id: id.into(),
            kind: "message".into(),
            priority: NotificationPriority::Normal,
            message: "hello".into(),
            read: false,
            created_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn router_applies_pushes_while_active() {
        let chats = Arc::new(Mutex::new(ChatStore::new()));
        let feed = Arc::new(Mutex::new(NotificationFeed::new(false, None)));
        let router = EventRouter::new(chats, feed.clone());

        router.route(push(5)).await;
        router.route(notification("n1")).await;

        let feed = feed.lock().await;
        assert_eq!(feed.unread(), 5);
        assert_eq!(feed.items().len(), 1);
    }

    #[tokio::test]
    async fn no_push_mutates_state_after_logout() {
        let chats = Arc::new(Mutex::new(ChatStore::new()));
        let feed = Arc::new(Mutex::new(NotificationFeed::new(false, None)));
        let router = EventRouter::new(chats.clone(), feed.clone());

        router.route(push(3)).await;
        router.shutdown();

        // Simulated post-logout pushes.
        router.route(push(9)).await;
        router.route(notification("late")).await;

        let feed = feed.lock().await;
        assert_eq!(feed.unread(), 3);
        assert!(feed.items().is_empty());
    }

    use crate::models::User;
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    fn member() -> User {
        User {
            id: "u1".into(),
            name: "Jane Doe".into(),
            email: "jane@example.com".into(),
            role: "member".into(),
            membership_plan: None,
            membership_status: None,
        }
    }

    fn test_config(ws_url: &str) -> Config {
        Config {
            api_base_url: "http://127.0.0.1:1".into(),
            ws_url: ws_url.into(),
            gate_device_id: "gate-1".into(),
            gate_login_email: None,
            gate_login_password: None,
            result_dwell_ms: 4000,
            decode_failure_dwell_ms: 3000,
            scan_request_timeout_ms: None,
            typing_debounce_ms: 2000,
            reconnect_max_attempts: 5,
            reconnect_base_delay_ms: 50,
            reconnect_max_delay_ms: 200,
            desktop_alerts: false,
        }
    }

    /// In-memory stand-in for the WebSocket transport: yields scripted inbound
    /// frames, swallows outbound ones.
    struct FakeTransport {
        inbound: VecDeque<WsMessage>,
    }

    impl Stream for FakeTransport {
        type Item = Result<WsMessage, WsError>;

        fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            match self.inbound.pop_front() {
                Some(frame) => Poll::Ready(Some(Ok(frame))),
                None => Poll::Pending,
            }
        }
    }

    impl Sink<WsMessage> for FakeTransport {
        type Error = WsError;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, _item: WsMessage) -> Result<(), WsError> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }
    }

    fn unread_frame(count: u32) -> WsMessage {
        WsMessage::Text(format!(
            r#"{{"event":"notification:unread-count","data":{{"count":{}}}}}"#,
            count
        ))
    }

    #[tokio::test]
    async fn logout_beats_a_ready_inbound_frame() {
        let chats = Arc::new(Mutex::new(ChatStore::new()));
        let feed = Arc::new(Mutex::new(NotificationFeed::new(false, None)));
        let router = Arc::new(EventRouter::new(chats, feed.clone()));
        let session = SessionHandle::new();
        session.establish(AuthSession { token: "tok".into(), user: member() });

        let (mut supervisor, _tx) =
            SocketSupervisor::new(&test_config("ws://unused"), session.clone(), router.clone());
        let mut sessions = session.subscribe();
        sessions.borrow_and_update();

        // Logout lands while a frame is already buffered on the transport.
        session.clear();
        let transport = FakeTransport { inbound: VecDeque::from([unread_frame(9)]) };

        let end = supervisor.drive(transport, &mut sessions, "tok").await;
        assert_eq!(end, LinkEnd::SessionEnded);
        assert!(!router.is_active());
        assert_eq!(feed.lock().await.unread(), 0);
    }

    #[tokio::test]
    async fn inbound_frames_route_while_session_lives() {
        let chats = Arc::new(Mutex::new(ChatStore::new()));
        let feed = Arc::new(Mutex::new(NotificationFeed::new(false, None)));
        let router = Arc::new(EventRouter::new(chats, feed.clone()));
        let session = SessionHandle::new();
        session.establish(AuthSession { token: "tok".into(), user: member() });

        let (mut supervisor, _tx) =
            SocketSupervisor::new(&test_config("ws://unused"), session.clone(), router.clone());
        let mut sessions = session.subscribe();
        sessions.borrow_and_update();

        let transport = FakeTransport { inbound: VecDeque::from([unread_frame(4)]) };
        let task = tokio::spawn(async move {
            supervisor.drive(transport, &mut sessions, "tok").await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(feed.lock().await.unread(), 4);
        assert!(router.is_active());
        task.abort();
    }

    #[tokio::test]
    async fn logout_during_backoff_deactivates_the_router() {
        let chats = Arc::new(Mutex::new(ChatStore::new()));
        let feed = Arc::new(Mutex::new(NotificationFeed::new(false, None)));
        let router = Arc::new(EventRouter::new(chats, feed.clone()));
        let session = SessionHandle::new();
        session.establish(AuthSession { token: "tok".into(), user: member() });

        // Nothing listens here, so every connect fails and the supervisor
        // spends its life in the retry/backoff loop.
        let (supervisor, _tx) = SocketSupervisor::new(
            &test_config("ws://127.0.0.1:9/ws"),
            session.clone(),
            router.clone(),
        );
        let task = tokio::spawn(supervisor.run());

        tokio::time::sleep(Duration::from_millis(20)).await;
        session.clear();

        let mut waited = Duration::ZERO;
        while router.is_active() && waited < Duration::from_secs(2) {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waited += Duration::from_millis(20);
        }
        assert!(!router.is_active());

        router.route(push(6)).await;
        assert_eq!(feed.lock().await.unread(), 0);

        task.abort();
    }

    #[tokio::test]
    async fn router_resumes_for_a_new_session() {
        let chats = Arc::new(Mutex::new(ChatStore::new()));
        let feed = Arc::new(Mutex::new(NotificationFeed::new(false, None)));
        let router = EventRouter::new(chats, feed.clone());

        router.shutdown();
        router.resume();
        router.route(push(2)).await;
        assert_eq!(feed.lock().await.unread(), 2);
    }
}
