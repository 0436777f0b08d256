//! Client-held notification state. The list is prepended on push; the unread
//! count is an authoritative server value replaced outright on every push,
//! with no reconciliation against locally-marked-read items.

use std::sync::Arc;

use crate::error::ClientError;
use crate::models::Notification;

/// Platform alert surface (desktop/system notifications). Best-effort only.
pub trait AlertSink: Send + Sync {
    fn alert(&self, notification: &Notification) -> Result<(), ClientError>;
}

/// Fallback sink that just logs the alert.
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn alert(&self, notification: &Notification) -> Result<(), ClientError> {
        tracing::info!(kind = %notification.kind, "{}", notification.message);
        Ok(())
    }
}

pub struct NotificationFeed {
    items: Vec<Notification>,
    unread: u32,
    alerts_granted: bool,
    sink: Option<Arc<dyn AlertSink>>,
}

impl NotificationFeed {
    /// `alerts_granted` reflects a permission decision made before this
    /// session; the feed never prompts for it.
    pub fn new(alerts_granted: bool, sink: Option<Arc<dyn AlertSink>>) -> Self {
        NotificationFeed {
            items: Vec::new(),
            unread: 0,
            alerts_granted,
            sink,
        }
    }

    /// Full refresh from REST.
    pub fn replace(&mut self, items: Vec<Notification>) {
        self.items = items;
    }

    /// `notification:new` push: prepend, then surface a platform alert if
    /// permission was granted. Alert failures are swallowed.
    pub fn push(&mut self, notification: Notification) {
        if self.alerts_granted {
            if let Some(sink) = &self.sink {
                if let Err(e) = sink.alert(&notification) {
                    tracing::debug!(error = %e, "platform alert failed");
                }
            }
        }
        self.items.insert(0, notification);
    }

    /// `notification:unread-count` push: last write wins.
    pub fn set_unread(&mut self, count: u32) {
        self.unread = count;
    }

    pub fn unread(&self) -> u32 {
        self.unread
    }

    /// Badge text; `None` means no badge is rendered at all.
    pub fn badge(&self) -> Option<String> {
        if self.unread == 0 {
            None
        } else {
            Some(self.unread.to_string())
        }
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }
}
