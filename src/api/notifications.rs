use crate::api::ApiClient;
use crate::error::ClientError;
use crate::models::Notification;

impl ApiClient {
    /// GET /api/notifications (requires auth)
    pub async fn notifications(&self) -> Result<Vec<Notification>, ClientError> {
        let resp = self.authed(self.http.get(self.url("/api/notifications")))?.send().await?;
        Ok(resp.error_for_status()?.json().await?)
    }

    /// PATCH /api/notifications/:id/read (requires auth). Callers re-fetch the
    /// list afterwards; the unread badge itself only moves on a server push.
    pub async fn mark_notification_read(&self, id: &str) -> Result<(), ClientError> {
        let resp = self
            .authed(self.http.patch(self.url(&format!("/api/notifications/{}/read", id))))?
            .send()
            .await?;
        resp.error_for_status()?;
        Ok(())
    }

    /// PATCH /api/notifications/read-all (requires auth)
    pub async fn mark_all_notifications_read(&self) -> Result<(), ClientError> {
        let resp = self
            .authed(self.http.patch(self.url("/api/notifications/read-all")))?
            .send()
            .await?;
        resp.error_for_status()?;
        Ok(())
    }
}
