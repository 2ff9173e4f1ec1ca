//! Per-role channel registry.
//!
//! Holds the configuration and transport shared by both roles, and builds
//! each role's `EventChannel` on first use. Every caller asking for a role
//! gets a clone of the same channel, so there is exactly one connection
//! manager per role for the registry's lifetime.

use std::sync::{Arc, OnceLock};

use tracing::info;

use rl_core::config::AppConfig;
use rl_models::UserRole;
use rl_socket::{Transport, WsTransport};

use crate::channel::EventChannel;

pub struct ChannelRegistry {
    config: AppConfig,
    transport: Arc<dyn Transport>,
    driver: OnceLock<EventChannel>,
    passenger: OnceLock<EventChannel>,
}

impl ChannelRegistry {
    pub fn new(config: AppConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            driver: OnceLock::new(),
            passenger: OnceLock::new(),
        }
    }

    /// Registry over real WebSocket connections.
    pub fn with_websocket(config: AppConfig) -> Self {
        let transport = WsTransport::from_config(&config.server);
        Self::new(config, Arc::new(transport))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn slot(&self, role: UserRole) -> &OnceLock<EventChannel> {
        match role {
            UserRole::Driver => &self.driver,
            UserRole::Passenger => &self.passenger,
        }
    }

    /// The role's channel, built on first call.
    pub fn channel(&self, role: UserRole) -> EventChannel {
        self.slot(role)
            .get_or_init(|| {
                info!("initializing {role} channel");
                EventChannel::from_config(role, &self.config, self.transport.clone())
            })
            .clone()
    }

    pub fn driver(&self) -> EventChannel {
        self.channel(UserRole::Driver)
    }

    pub fn passenger(&self) -> EventChannel {
        self.channel(UserRole::Passenger)
    }

    pub fn is_initialized(&self, role: UserRole) -> bool {
        self.slot(role).get().is_some()
    }

    /// Disconnect every channel that was built.
    pub async fn shutdown(&self) {
        for role in [UserRole::Driver, UserRole::Passenger] {
            if let Some(channel) = self.slot(role).get() {
                channel.disconnect().await;
            }
        }
        info!("channel registry shut down");
    }
}
