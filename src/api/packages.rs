use serde::Serialize;

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::models::{CheckoutParams, MembershipPackage, Payment};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutRequest<'a> {
    package_id: &'a str,
}

impl ApiClient {
    /// GET /api/packages
    pub async fn packages(&self) -> Result<Vec<MembershipPackage>, ClientError> {
        let resp = self.http.get(self.url("/api/packages")).send().await?;
        Ok(resp.error_for_status()?.json().await?)
    }

    /// POST /api/payments/checkout (requires auth). Returns the gateway form
    /// fields, signature included; the hash is backend-computed and opaque here.
    pub async fn checkout(&self, package_id: &str) -> Result<CheckoutParams, ClientError> {
        let resp = self
            .authed(self.http.post(self.url("/api/payments/checkout")))?
            .json(&CheckoutRequest { package_id })
            .send()
            .await?;
        Ok(resp.error_for_status()?.json().await?)
    }

    /// GET /api/payments (requires auth)
    pub async fn payments(&self) -> Result<Vec<Payment>, ClientError> {
        let resp = self.authed(self.http.get(self.url("/api/payments")))?.send().await?;
        Ok(resp.error_for_status()?.json().await?)
    }
}
