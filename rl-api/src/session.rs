//! In-memory authentication state.
//!
//! The stored credential is read once at startup. A record that carries a
//! role and an id is trusted as a logged-in session without contacting the
//! server; token validity is discovered lazily by `AuthClient`.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use rl_core::error::{RlError, RlResult};
use rl_models::{Credential, UserRole};

use crate::credentials::CredentialStore;

/// Who is logged in, as far as this process knows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub is_authenticated: bool,
    pub phone_number: Option<String>,
    pub user_type: Option<UserRole>,
    pub user_id: Option<String>,
}

pub struct AuthSession {
    store: Arc<dyn CredentialStore>,
    state: RwLock<SessionState>,
}

impl AuthSession {
    /// Restore the session from `store`.
    ///
    /// An unreadable or invalid record is logged and treated as logged out.
    pub async fn bootstrap(store: Arc<dyn CredentialStore>) -> Self {
        let state = match store.get().await {
            Ok(Some(credential)) if credential.has_identity() => {
                info!(
                    "restored {} session for {}",
                    credential.user_type.map(|r| r.as_str()).unwrap_or("?"),
                    credential.id.as_deref().unwrap_or("?")
                );
                SessionState {
                    is_authenticated: true,
                    phone_number: Some(credential.phone_number).filter(|p| !p.is_empty()),
                    user_type: credential.user_type,
                    user_id: credential.id,
                }
            }
            Ok(Some(_)) => {
                warn!("stored credential has no role or id, login required");
                SessionState::default()
            }
            Ok(None) => SessionState::default(),
            Err(e) => {
                warn!("could not read stored credential: {e}");
                SessionState::default()
            }
        };

        Self {
            store,
            state: RwLock::new(state),
        }
    }

    /// Mark the session logged in. Does not touch the store.
    pub async fn login(&self, phone_number: &str, user_type: UserRole, user_id: &str) {
        let mut state = self.state.write().await;
        *state = SessionState {
            is_authenticated: true,
            phone_number: Some(phone_number.to_string()).filter(|p| !p.is_empty()),
            user_type: Some(user_type),
            user_id: Some(user_id.to_string()),
        };
        info!("logged in as {} {}", user_type, user_id);
    }

    /// Persist a freshly issued credential and log in with it.
    pub async fn complete_login(&self, credential: &Credential) -> RlResult<()> {
        let (Some(user_type), Some(user_id)) = (credential.user_type, credential.id.as_deref())
        else {
            return Err(RlError::InvalidCredential(
                "credential has no role or id".into(),
            ));
        };
        self.store.set(credential).await?;
        self.login(&credential.phone_number, user_type, user_id).await;
        Ok(())
    }

    /// Forget the session in memory and in the store.
    pub async fn logout(&self) -> RlResult<()> {
        *self.state.write().await = SessionState::default();
        self.store.clear().await?;
        info!("logged out");
        Ok(())
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated
    }

    pub async fn user_type(&self) -> Option<UserRole> {
        self.state.read().await.user_type
    }

    pub async fn user_id(&self) -> Option<String> {
        self.state.read().await.user_id.clone()
    }
}
