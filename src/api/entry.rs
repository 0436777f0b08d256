use async_trait::async_trait;
use serde::Serialize;

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::gate::ScanValidator;
use crate::models::ScanResult;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanValidationRequest<'a> {
    payload: &'a serde_json::Value,
    device_id: &'a str,
}

impl ApiClient {
    /// POST /api/entry/scan (requires auth). The JSON body of ANY HTTP status
    /// is the verdict; a denied scan comes back as a normal response, not an
    /// error status to bail on.
    pub async fn validate_scan(
        &self,
        payload: &serde_json::Value,
    ) -> Result<ScanResult, ClientError> {
        let mut req = self.authed(self.http.post(self.url("/api/entry/scan")))?.json(
            &ScanValidationRequest {
                payload,
                device_id: &self.gate_device_id,
            },
        );
        if let Some(timeout) = self.scan_timeout {
            req = req.timeout(timeout);
        }

        let resp = req.send().await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ScanValidator for ApiClient {
    async fn validate(&self, payload: &serde_json::Value) -> Result<ScanResult, ClientError> {
        self.validate_scan(payload).await
    }
}
