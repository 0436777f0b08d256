use serde::{Deserialize, Serialize};

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::models::User;
use crate::session::AuthSession;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct GoogleExchangeRequest<'a> {
    #[serde(rename = "idToken")]
    id_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    user: User,
}

impl ApiClient {
    /// POST /api/auth/login — establishes the session on success.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ClientError> {
        let resp = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ClientError::Auth(format!("Login failed: {}", resp.status())));
        }

        let body: AuthResponse = resp.json().await?;
        let session = AuthSession { token: body.token, user: body.user };
        self.session.establish(session.clone());
        Ok(session)
    }

    /// POST /api/auth/google — exchanges a Google OAuth id token for a
    /// backend-issued session token.
    pub async fn google_exchange(&self, id_token: &str) -> Result<AuthSession, ClientError> {
        let resp = self
            .http
            .post(self.url("/api/auth/google"))
            .json(&GoogleExchangeRequest { id_token })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ClientError::Auth(format!(
                "OAuth exchange failed: {}",
                resp.status()
            )));
        }

        let body: AuthResponse = resp.json().await?;
        let session = AuthSession { token: body.token, user: body.user };
        self.session.establish(session.clone());
        Ok(session)
    }

    /// GET /api/auth/me (requires auth)
    pub async fn me(&self) -> Result<User, ClientError> {
        let resp = self.authed(self.http.get(self.url("/api/auth/me")))?.send().await?;

        if !resp.status().is_success() {
            return Err(ClientError::Auth(format!("Session rejected: {}", resp.status())));
        }

        Ok(resp.json().await?)
    }

    /// POST /api/auth/logout — the local session is torn down even when the
    /// backend call fails, so the socket always drops.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = match self.authed(self.http.post(self.url("/api/auth/logout"))) {
            Ok(req) => req.send().await.map(|_| ()).map_err(ClientError::Http),
            Err(e) => Err(e),
        };
        self.session.clear();
        result
    }
}
