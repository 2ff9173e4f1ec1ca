//! Stored credential record.

use serde::{Deserialize, Serialize};
use rl_core::constants::headers;
use rl_core::error::{RlError, RlResult};

use super::role::UserRole;

/// The single identity persisted on a device.
///
/// Serialized as one camelCase JSON blob under a fixed key. Both tokens
/// must be non-empty; identity fields may be missing on records written by
/// older clients, in which case the session is not considered authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub user_type: Option<UserRole>,
    #[serde(default)]
    pub id: Option<String>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        phone_number: impl Into<String>,
        user_type: UserRole,
        id: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            phone_number: phone_number.into(),
            user_type: Some(user_type),
            id: Some(id.into()),
        }
    }

    /// Check the token invariant.
    pub fn validate(&self) -> RlResult<()> {
        if self.access_token.trim().is_empty() {
            return Err(RlError::InvalidCredential("access token is empty".into()));
        }
        if self.refresh_token.trim().is_empty() {
            return Err(RlError::InvalidCredential("refresh token is empty".into()));
        }
        Ok(())
    }

    /// Whether the record carries enough identity to skip login.
    pub fn has_identity(&self) -> bool {
        self.user_type.is_some() && self.id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Copy of this record with rotated tokens.
    pub fn with_tokens(&self, access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            ..self.clone()
        }
    }

    /// Session headers identifying the caller to the REST backend.
    pub fn session_headers(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::with_capacity(2);
        if !self.phone_number.is_empty() {
            out.push((headers::SESSION_PHONE, self.phone_number.clone()));
        }
        if let (Some(role), Some(id)) = (self.user_type, self.id.as_ref()) {
            let name = match role {
                UserRole::Driver => headers::SESSION_DRIVER_ID,
                UserRole::Passenger => headers::SESSION_PASSENGER_ID,
            };
            out.push((name, id.clone()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_format_is_camel_case() {
        let cred = Credential::new("a1", "r1", "+15550001", UserRole::Driver, "drv-9");
        let json = serde_json::to_value(&cred).unwrap();
        assert_eq!(json["accessToken"], "a1");
        assert_eq!(json["refreshToken"], "r1");
        assert_eq!(json["phoneNumber"], "+15550001");
        assert_eq!(json["userType"], "driver");
        assert_eq!(json["id"], "drv-9");
    }

    #[test]
    fn test_partial_blob_has_no_identity() {
        let cred: Credential =
            serde_json::from_str(r#"{"accessToken":"a","refreshToken":"r"}"#).unwrap();
        assert!(cred.validate().is_ok());
        assert!(!cred.has_identity());
        assert!(cred.session_headers().is_empty());
    }

    #[test]
    fn test_empty_tokens_rejected() {
        let cred = Credential::new("", "r", "", UserRole::Passenger, "p");
        assert!(matches!(cred.validate(), Err(RlError::InvalidCredential(_))));
        let cred = Credential::new("a", "  ", "", UserRole::Passenger, "p");
        assert!(cred.validate().is_err());
    }

    #[test]
    fn test_session_headers_follow_role() {
        let cred = Credential::new("a", "r", "+1555", UserRole::Passenger, "p-1");
        let headers = cred.session_headers();
        assert!(headers.contains(&("x-session-phone", "+1555".to_string())));
        assert!(headers.contains(&("x-session-passenger-id", "p-1".to_string())));
        assert!(!headers.iter().any(|(k, _)| *k == "x-session-driver-id"));
    }

    #[test]
    fn test_with_tokens_keeps_identity() {
        let cred = Credential::new("a", "r", "+1555", UserRole::Driver, "d-1");
        let rotated = cred.with_tokens("a2".into(), "r2".into());
        assert_eq!(rotated.access_token, "a2");
        assert_eq!(rotated.id.as_deref(), Some("d-1"));
    }
}
