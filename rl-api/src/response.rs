//! Response payload helpers.
//!
//! The backend is inconsistent about envelopes: some endpoints return the
//! payload at the top level, others wrap it as `{ "data": { ... } }`. Both
//! forms are accepted everywhere.

use rl_core::{RlError, RlResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Token pair returned by the refresh endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    /// Missing when the server does not rotate refresh tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Body of a successful OTP verification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpPayload {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, alias = "userId", alias = "driverId", alias = "passengerId")]
    pub id: Option<String>,
    #[serde(default)]
    pub user: Option<UserRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserRef {
    #[serde(alias = "_id")]
    pub id: String,
}

impl VerifyOtpPayload {
    pub fn user_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .or(self.user.as_ref().map(|u| u.id.as_str()))
            .filter(|id| !id.is_empty())
    }
}

/// Deserialize `body`, looking inside a `data` envelope when present.
pub fn unwrap_data<T: DeserializeOwned>(body: serde_json::Value) -> RlResult<T> {
    let payload = match body {
        serde_json::Value::Object(mut map) if map.get("data").is_some_and(|d| d.is_object()) => {
            map.remove("data").unwrap_or_default()
        }
        other => other,
    };
    serde_json::from_value(payload)
        .map_err(|e| RlError::Serialization(format!("failed to parse response: {e}")))
}

/// Pull a human-readable message out of an error body.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_pair_top_level() {
        let pair: TokenPair =
            unwrap_data(json!({"accessToken": "a2", "refreshToken": "r2"})).unwrap();
        assert_eq!(pair.access_token, "a2");
        assert_eq!(pair.refresh_token.as_deref(), Some("r2"));
    }

    #[test]
    fn test_token_pair_in_envelope() {
        let pair: TokenPair = unwrap_data(json!({
            "success": true,
            "data": {"accessToken": "a3"}
        }))
        .unwrap();
        assert_eq!(pair.access_token, "a3");
        assert_eq!(pair.refresh_token, None);
    }

    #[test]
    fn test_missing_token_is_error() {
        let result: RlResult<TokenPair> = unwrap_data(json!({"data": {"token": "x"}}));
        assert!(matches!(result, Err(RlError::Serialization(_))));
    }

    #[test]
    fn test_verify_payload_user_id_sources() {
        let p: VerifyOtpPayload =
            unwrap_data(json!({"accessToken": "a", "refreshToken": "r", "driverId": "d-4"})).unwrap();
        assert_eq!(p.user_id(), Some("d-4"));

        let p: VerifyOtpPayload = unwrap_data(json!({
            "data": {"accessToken": "a", "refreshToken": "r", "user": {"_id": "p-2"}}
        }))
        .unwrap();
        assert_eq!(p.user_id(), Some("p-2"));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message(r#"{"message":"Invalid OTP"}"#), "Invalid OTP");
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }
}
