//! CLI command implementations.

pub mod auth;
pub mod chat;
pub mod connect;
pub mod gps;
pub mod request;

use std::sync::Arc;
use std::time::Duration;

use rl_api::{AuthClient, FileCredentialStore};
use rl_core::config::ConfigHandle;
use rl_core::error::{RlError, RlResult};
use rl_models::UserRole;
use rl_services::ChannelRegistry;
use rl_socket::{ConnectOutcome, ConnectionState};

/// How long one-shot commands wait for the socket handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Helper to open the file credential store from config.
pub async fn credential_store(config: &ConfigHandle) -> RlResult<Arc<FileCredentialStore>> {
    let path = config.read().await.effective_credential_path()?;
    Ok(Arc::new(FileCredentialStore::new(path)))
}

/// Helper to create an auth client backed by the file credential store.
pub async fn create_auth_client(config: &ConfigHandle) -> RlResult<AuthClient> {
    let store = credential_store(config).await?;
    let server_config = config.read().await.server.clone();
    AuthClient::new(&server_config, store)
}

/// Helper to build a registry over real WebSocket connections.
pub async fn create_registry(config: &ConfigHandle) -> ChannelRegistry {
    ChannelRegistry::with_websocket(config.snapshot().await)
}

/// Connect `user` on the role's channel and wait for the handshake.
pub async fn connect_and_wait(
    registry: &ChannelRegistry,
    role: UserRole,
    user: &str,
) -> RlResult<rl_services::EventChannel> {
    let channel = registry.channel(role);
    match channel.connect(user).await {
        ConnectOutcome::Rejected(reason) => {
            return Err(RlError::InvalidArgument(format!(
                "{role} identity {user:?} refused: {reason}"
            )));
        }
        ConnectOutcome::OpenFailed => {
            let status = channel.status().await;
            return Err(RlError::Socket(
                status
                    .connection_error
                    .unwrap_or_else(|| "socket open failed".into()),
            ));
        }
        _ => {}
    }

    let mut state = channel.manager().state_receiver();
    let wait = async {
        loop {
            match *state.borrow_and_update() {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Failed => {
                    return Err(RlError::Socket("reconnect attempts exhausted".into()))
                }
                _ => {}
            }
            if state.changed().await.is_err() {
                return Err(RlError::NotConnected);
            }
        }
    };
    tokio::time::timeout(CONNECT_TIMEOUT, wait)
        .await
        .map_err(|_| RlError::Timeout(format!("no handshake within {CONNECT_TIMEOUT:?}")))??;
    Ok(channel)
}
