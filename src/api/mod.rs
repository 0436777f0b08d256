//! Typed REST consumer for the backend API. The backend is the source of truth
//! for every entity; callers re-fetch after a mutation instead of reconciling
//! optimistically.

pub mod auth;
pub mod chat;
pub mod entry;
pub mod notifications;
pub mod packages;

use std::time::Duration;

use reqwest::RequestBuilder;

use crate::config::Config;
use crate::error::ClientError;
use crate::session::SessionHandle;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    gate_device_id: String,
    // None means no client-side timeout on scan validation (observed behavior).
    scan_timeout: Option<Duration>,
    session: SessionHandle,
}

impl ApiClient {
    pub fn new(config: &Config, session: SessionHandle) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(ClientError::Http)?;

        Ok(ApiClient {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            gate_device_id: config.gate_device_id.clone(),
            scan_timeout: config.scan_request_timeout_ms.map(Duration::from_millis),
            session,
        })
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the bearer token, failing if no session is established.
    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self
            .session
            .token()
            .ok_or_else(|| ClientError::Auth("Not authenticated".to_string()))?;
        Ok(req.bearer_auth(token))
    }
}
