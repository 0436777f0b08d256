//! Session lifecycle: established on login or OAuth callback, torn down on
//! logout. The socket supervisor observes the same handle, so clearing the
//! session is what deterministically drops the realtime connection.

use std::sync::Arc;

use tokio::sync::watch;

use crate::models::User;

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

/// Shared handle to the current session. Clones observe the same state.
#[derive(Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<Option<AuthSession>>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        SessionHandle { tx: Arc::new(tx) }
    }

    pub fn establish(&self, session: AuthSession) {
        let _ = self.tx.send(Some(session));
    }

    pub fn clear(&self) {
        let _ = self.tx.send(None);
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.tx.borrow().clone()
    }

    /// Bearer token for REST calls and the socket handshake.
    pub fn token(&self) -> Option<String> {
        self.tx.borrow().as_ref().map(|s| s.token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.tx.subscribe()
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}
