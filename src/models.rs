//! Shapes consumed from the backend. The backend owns all of these; the client
//! holds transient, derived copies only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryDecision {
    Allowed,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Inactive,
    Expired,
    GracePeriod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanUser {
    pub name: String,
    pub membership_plan: String,
    pub membership_status: MembershipStatus,
}

impl ScanUser {
    /// Panel caption, e.g. "PREMIUM Member".
    pub fn membership_label(&self) -> String {
        format!("{} Member", self.membership_plan.to_uppercase())
    }
}

/// One scan-validation verdict. Held only for the result-display window of the
/// gate cycle, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub success: bool,
    pub entry: EntryDecision,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ScanUser>,
}

impl ScanResult {
    /// Local denial synthesized when the QR payload never produced a backend
    /// verdict (malformed payload, request failure).
    pub fn invalid_format() -> Self {
        ScanResult {
            success: false,
            entry: EntryDecision::Denied,
            reason: "Invalid QR code format".to_string(),
            user: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub membership_plan: Option<String>,
    #[serde(default)]
    pub membership_status: Option<MembershipStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    pub key: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: NotificationPriority,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipPackage {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub duration_days: u32,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub user_id: String,
    pub package_id: String,
    pub amount: f64,
    pub order_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Hosted-gateway checkout fields. The signature hash is computed by the
/// backend; the client never derives it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutParams {
    pub merchant_id: String,
    pub order_id: String,
    pub amount: String,
    pub signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_result_parses_backend_verdict() {
        let body = r#"{
            "success": true,
            "entry": "allowed",
            "reason": "Active membership",
            "user": {
                "name": "Jane Doe",
                "membershipPlan": "premium",
                "membershipStatus": "active"
            }
        }"#;
        let result: ScanResult = serde_json::from_str(body).unwrap();
        assert!(result.success);
        assert_eq!(result.entry, EntryDecision::Allowed);
        let user = result.user.unwrap();
        assert_eq!(user.name, "Jane Doe");
        assert_eq!(user.membership_label(), "PREMIUM Member");
        assert_eq!(user.membership_status, MembershipStatus::Active);
    }

    #[test]
    fn scan_result_user_is_optional() {
        let body = r#"{"success":false,"entry":"denied","reason":"Membership expired"}"#;
        let result: ScanResult = serde_json::from_str(body).unwrap();
        assert_eq!(result.entry, EntryDecision::Denied);
        assert!(result.user.is_none());
    }

    #[test]
    fn grace_period_status_round_trips() {
        let status: MembershipStatus = serde_json::from_str("\"grace_period\"").unwrap();
        assert_eq!(status, MembershipStatus::GracePeriod);
    }
}
