//! Shared test utilities for socket integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use rl_core::config::RoleSocketConfig;
use rl_models::UserRole;
use rl_socket::{ConnectionManager, LoopbackPeer, LoopbackTransport};

/// Let spawned tasks drain their queues without moving the clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Advance the (paused) clock and let the woken tasks run.
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    settle().await;
}

/// A manager over a fresh loopback transport using the role's defaults.
pub fn create_manager(role: UserRole) -> (ConnectionManager, Arc<LoopbackTransport>) {
    let transport = Arc::new(LoopbackTransport::new());
    let manager = ConnectionManager::builder(role, transport.clone())
        .url("ws://loopback/ws")
        .build();
    (manager, transport)
}

/// Same as `create_manager` with a custom policy.
pub fn create_manager_with_policy(
    role: UserRole,
    policy: RoleSocketConfig,
) -> (ConnectionManager, Arc<LoopbackTransport>) {
    let transport = Arc::new(LoopbackTransport::new());
    let manager = ConnectionManager::builder(role, transport.clone())
        .url("ws://loopback/ws")
        .policy(policy)
        .build();
    (manager, transport)
}

/// Connect `user_id` and complete the handshake.
pub async fn connect_and_open(
    manager: &ConnectionManager,
    transport: &LoopbackTransport,
    user_id: &str,
) -> LoopbackPeer {
    manager.connect(user_id).await;
    let peer = transport.last_peer().expect("no socket was opened");
    peer.open();
    settle().await;
    peer
}
