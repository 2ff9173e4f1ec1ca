//! Shared test utilities for API integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use rl_api::{AuthClient, CredentialStore, MemoryCredentialStore};
use rl_core::config::ServerConfig;
use rl_models::{Credential, UserRole};
use wiremock::MockServer;

/// A driver credential holding the given tokens.
pub fn driver_credential(access: &str, refresh: &str) -> Credential {
    Credential::new(access, refresh, "+2348012345678", UserRole::Driver, "drv-42")
}

/// Server config pointing at the mock server's `/api` root.
pub fn server_config(server: &MockServer) -> ServerConfig {
    ServerConfig {
        api_base_url: format!("{}/api", server.uri()),
        ..ServerConfig::default()
    }
}

/// A client over a memory store seeded with `credential`.
pub fn create_client(
    server: &MockServer,
    credential: Option<&Credential>,
) -> (AuthClient, Arc<MemoryCredentialStore>) {
    let store = Arc::new(match credential {
        Some(c) => MemoryCredentialStore::with_credential(c).expect("invalid test credential"),
        None => MemoryCredentialStore::new(),
    });
    let client = AuthClient::new(&server_config(server), store.clone() as Arc<dyn CredentialStore>)
        .expect("failed to build client");
    (client, store)
}
