use crate::error::ClientError;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub ws_url: String,
    pub gate_device_id: String,
    pub gate_login_email: Option<String>,
    pub gate_login_password: Option<String>,
    /// Dwell after a backend-supplied scan result. Asymmetric with the
    /// decode-failure dwell on purpose; do not unify.
    pub result_dwell_ms: u64,
    /// Dwell after a locally synthesized denial (bad QR payload, request error).
    pub decode_failure_dwell_ms: u64,
    /// No timeout by default, matching the browser-fetch behavior the backend
    /// contract was written against.
    pub scan_request_timeout_ms: Option<u64>,
    pub typing_debounce_ms: u64,
    pub reconnect_max_attempts: u32,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    /// Whether the operator granted platform alert permission.
    pub desktop_alerts: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let api_base_url = std::env::var("API_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5000".to_string());

        let ws_url = match std::env::var("WS_URL") {
            Ok(url) => url,
            Err(_) => derive_ws_url(&api_base_url),
        };

        Ok(Config {
            api_base_url,
            ws_url,
            gate_device_id: std::env::var("GATE_DEVICE_ID")
                .unwrap_or_else(|_| "gate-1".to_string()),
            gate_login_email: std::env::var("GATE_LOGIN_EMAIL").ok(),
            gate_login_password: std::env::var("GATE_LOGIN_PASSWORD").ok(),
            result_dwell_ms: parse_var("RESULT_DWELL_MS", 4000)?,
            decode_failure_dwell_ms: parse_var("DECODE_FAILURE_DWELL_MS", 3000)?,
            scan_request_timeout_ms: match std::env::var("SCAN_REQUEST_TIMEOUT_MS") {
                Ok(v) => Some(v.parse().map_err(|e| {
                    ClientError::Config(format!("Invalid SCAN_REQUEST_TIMEOUT_MS: {}", e))
                })?),
                Err(_) => None,
            },
            typing_debounce_ms: parse_var("TYPING_DEBOUNCE_MS", 2000)?,
            reconnect_max_attempts: parse_var("RECONNECT_MAX_ATTEMPTS", 5)?,
            reconnect_base_delay_ms: parse_var("RECONNECT_BASE_DELAY_MS", 1000)?,
            reconnect_max_delay_ms: parse_var("RECONNECT_MAX_DELAY_MS", 5000)?,
            desktop_alerts: parse_var("DESKTOP_ALERTS", false)?,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ClientError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|e| ClientError::Config(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

fn derive_ws_url(api_base_url: &str) -> String {
    let base = api_base_url.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/ws", ws)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_derived_from_base_url() {
        assert_eq!(derive_ws_url("http://localhost:5000/"), "ws://localhost:5000/ws");
        assert_eq!(derive_ws_url("https://api.example.com"), "wss://api.example.com/ws");
    }
}
