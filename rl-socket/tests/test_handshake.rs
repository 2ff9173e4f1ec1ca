//! Real WebSocket transport against a server that never completes the
//! upgrade: the manager must leave `Connecting` and fall into the bounded
//! reconnect path.

use std::sync::Arc;
use std::time::Duration;

use rl_core::config::RoleSocketConfig;
use rl_models::UserRole;
use rl_socket::{ConnectOutcome, ConnectionManager, ConnectionState, WsTransport};
use tokio::net::TcpListener;

/// Accepts TCP connections and holds them without ever answering.
async fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    format!("ws://{addr}/ws")
}

#[tokio::test]
async fn stalled_handshake_schedules_reconnect() {
    let url = silent_server().await;
    let mut policy = RoleSocketConfig::passenger_defaults();
    policy.reconnect_delay_ms = 60_000;

    let transport = WsTransport::new().with_handshake_timeout(Duration::from_millis(200));
    let manager = ConnectionManager::builder(UserRole::Passenger, Arc::new(transport))
        .url(url)
        .policy(policy)
        .build();

    assert_eq!(manager.connect("p-1").await, ConnectOutcome::Opening);

    let mut state = manager.state_receiver();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == ConnectionState::Reconnecting),
    )
    .await
    .expect("manager stayed in Connecting")
    .unwrap();

    let status = manager.status().await;
    assert!(!status.is_connected);
    assert_eq!(status.reconnect_attempts, 1);
    assert!(status
        .connection_error
        .as_deref()
        .is_some_and(|e| e.contains("timed out")));

    // the stuck socket is gone, so a fresh connect opens again
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(manager.connect("p-1").await, ConnectOutcome::Opening);
    manager.disconnect().await;
}
