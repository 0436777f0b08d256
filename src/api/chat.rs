use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::models::{Attachment, Chat, Message};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<&'a Attachment>,
}

impl ApiClient {
    /// GET /api/chat (requires auth)
    pub async fn chats(&self) -> Result<Vec<Chat>, ClientError> {
        let resp = self.authed(self.http.get(self.url("/api/chat")))?.send().await?;
        Ok(resp.error_for_status()?.json().await?)
    }

    /// GET /api/chat/:id/messages (requires auth). `before` is a cursor for
    /// paging backwards through history.
    pub async fn messages(
        &self,
        chat_id: &str,
        limit: i64,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, ClientError> {
        let limit = limit.clamp(1, 100);
        let mut req = self
            .authed(self.http.get(self.url(&format!("/api/chat/{}/messages", chat_id))))?
            .query(&[("limit", limit.to_string())]);
        if let Some(before) = before {
            req = req.query(&[("before", before.to_rfc3339())]);
        }

        let resp = req.send().await?;
        Ok(resp.error_for_status()?.json().await?)
    }

    /// POST /api/chat/send (requires auth). Attachment metadata is uploaded
    /// separately; only the descriptor rides along with the message.
    pub async fn send_message(
        &self,
        chat_id: &str,
        content: &str,
        attachment: Option<&Attachment>,
    ) -> Result<Message, ClientError> {
        if content.is_empty() && attachment.is_none() {
            return Err(ClientError::InvalidPayload(
                "Message needs content or an attachment".to_string(),
            ));
        }

        let resp = self
            .authed(self.http.post(self.url("/api/chat/send")))?
            .json(&SendMessageRequest { chat_id, content, attachment })
            .send()
            .await?;
        Ok(resp.error_for_status()?.json().await?)
    }
}
