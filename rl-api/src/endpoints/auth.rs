//! OTP login endpoints.
//!
//! Both calls are unauthenticated. Persisting the returned credential is the
//! caller's job (see `AuthSession::complete_login`).

use reqwest::Method;
use serde_json::json;
use tracing::info;

use rl_core::error::{RlError, RlResult};
use rl_models::{Credential, UserRole};

use crate::client::AuthClient;
use crate::response::{self, VerifyOtpPayload};

pub const SEND_OTP_PATH: &str = "/auth/send-otp";
pub const VERIFY_OTP_PATH: &str = "/auth/verify-otp";

impl AuthClient {
    /// Ask the backend to text a one-time code to `phone_number`.
    pub async fn send_otp(&self, phone_number: &str, user_type: UserRole) -> RlResult<()> {
        if phone_number.trim().is_empty() {
            return Err(RlError::InvalidArgument("phone number is empty".into()));
        }
        let body = json!({ "phoneNumber": phone_number, "userType": user_type });
        self.request_unauthenticated(Method::POST, SEND_OTP_PATH, Some(&body))
            .await?;
        info!("otp requested for {} ({})", phone_number, user_type);
        Ok(())
    }

    /// Exchange a one-time code for a credential.
    pub async fn verify_otp(
        &self,
        phone_number: &str,
        otp: &str,
        user_type: UserRole,
    ) -> RlResult<Credential> {
        let body = json!({ "phoneNumber": phone_number, "otp": otp, "userType": user_type });
        let resp = self
            .request_unauthenticated(Method::POST, VERIFY_OTP_PATH, Some(&body))
            .await?;
        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| RlError::Serialization(format!("failed to parse response: {e}")))?;
        let payload: VerifyOtpPayload = response::unwrap_data(value)?;

        let user_id = payload
            .user_id()
            .ok_or_else(|| RlError::InvalidCredential("verify-otp response has no user id".into()))?
            .to_string();
        let credential = Credential::new(
            payload.access_token,
            payload.refresh_token,
            phone_number,
            user_type,
            user_id,
        );
        credential.validate()?;
        info!("otp verified for {} ({})", phone_number, user_type);
        Ok(credential)
    }
}
