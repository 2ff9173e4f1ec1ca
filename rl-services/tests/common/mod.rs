//! Shared test utilities for service integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rl_core::config::AppConfig;
use rl_models::UserRole;
use rl_services::EventChannel;
use rl_socket::{LoopbackPeer, LoopbackTransport};

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

/// A channel for `role` over a fresh loopback transport with default config.
pub fn create_channel(role: UserRole) -> (EventChannel, Arc<LoopbackTransport>) {
    let transport = Arc::new(LoopbackTransport::new());
    let channel = EventChannel::from_config(role, &AppConfig::default(), transport.clone());
    (channel, transport)
}

/// Connect `user_id` and complete the handshake.
pub async fn open_channel(
    channel: &EventChannel,
    transport: &LoopbackTransport,
    user_id: &str,
) -> LoopbackPeer {
    channel.connect(user_id).await;
    let peer = transport.last_peer().expect("no socket was opened");
    peer.open();
    settle().await;
    peer
}

/// Collects everything a callback receives.
pub struct Recorder<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn callback(&self) -> impl Fn(T) + Send + Sync + 'static {
        let items = self.items.clone();
        move |item| items.lock().unwrap().push(item)
    }

    pub fn items(&self) -> Vec<T> {
        self.items.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }
}
