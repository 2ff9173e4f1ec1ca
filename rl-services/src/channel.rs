//! Per-role event channel.
//!
//! `EventChannel` is what app code talks to. It wraps the role's
//! `ConnectionManager`, builds outbound GPS and chat frames, and turns raw
//! inbound frames into typed callbacks.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use rl_core::config::AppConfig;
use rl_models::{
    now_millis, ChatMessage, Coordinate, GpsUpdate, OutboundFrame, RideCancellation,
    RideStatusUpdate, RideUpdate, UserRole, WalletBalanceUpdate,
};
use rl_socket::{ConnectOutcome, ConnectionManager, ConnectionStatus, Subscription, Transport};

use crate::throttle::GpsThrottle;

/// Role-facing façade over one connection manager. Clones share state.
#[derive(Clone)]
pub struct EventChannel {
    manager: ConnectionManager,
    throttle: Arc<Mutex<GpsThrottle>>,
}

impl EventChannel {
    /// Wrap `manager`, taking the GPS throttle from its policy.
    pub fn new(manager: ConnectionManager) -> Self {
        let throttle = GpsThrottle::new(manager.policy().gps_throttle);
        Self {
            manager,
            throttle: Arc::new(Mutex::new(throttle)),
        }
    }

    /// Driver channel over a manager built from `config`.
    pub fn driver(config: &AppConfig, transport: Arc<dyn Transport>) -> Self {
        Self::from_config(UserRole::Driver, config, transport)
    }

    /// Passenger channel over a manager built from `config`.
    pub fn passenger(config: &AppConfig, transport: Arc<dyn Transport>) -> Self {
        Self::from_config(UserRole::Passenger, config, transport)
    }

    pub fn from_config(role: UserRole, config: &AppConfig, transport: Arc<dyn Transport>) -> Self {
        Self::new(ConnectionManager::from_config(role, config, transport))
    }

    pub fn role(&self) -> UserRole {
        self.manager.role()
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub async fn connect(&self, user_id: &str) -> ConnectOutcome {
        self.manager.connect(user_id).await
    }

    pub async fn disconnect(&self) {
        self.manager.disconnect().await;
        self.throttle.lock().await.reset();
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.manager.status().await
    }

    // --- Outbound ---

    /// Send the current position.
    ///
    /// Returns `false` when not connected. A send suppressed by the role's
    /// throttle counts as success.
    pub async fn send_gps(&self, latitude: f64, longitude: f64) -> bool {
        let position = Coordinate::new(latitude, longitude);
        if !position.is_valid() {
            warn!("[{}] ignoring invalid position {latitude},{longitude}", self.role());
            return false;
        }
        if !self.manager.is_connected().await {
            return false;
        }
        let Some(user_id) = self.manager.current_user_id().await else {
            return false;
        };

        let now = Instant::now();
        let mut throttle = self.throttle.lock().await;
        if throttle.suppresses(&position, now) {
            debug!("[{}] gps unchanged, send suppressed", self.role());
            return true;
        }

        let frame = OutboundFrame::gps(self.role(), &user_id, position, now_millis());
        let sent = self.manager.send(&frame).await;
        if sent {
            throttle.record(position, now);
        }
        sent
    }

    /// Send a chat line for `ride_id` and return the message as sent.
    ///
    /// `None` when the text is blank, no user is connected or the write fails.
    pub async fn send_chat(&self, ride_id: &str, text: &str) -> Option<ChatMessage> {
        let user_id = self.manager.current_user_id().await?;
        let Some(message) = ChatMessage::compose(ride_id, &user_id, self.role(), text) else {
            debug!("[{}] empty chat message dropped", self.role());
            return None;
        };
        self.manager
            .send(&OutboundFrame::chat(&message))
            .await
            .then_some(message)
    }

    /// Send a chat line for `ride_id`. Returns whether it was transmitted.
    pub async fn send_chat_message(&self, ride_id: &str, text: &str) -> bool {
        self.send_chat(ride_id, text).await.is_some()
    }

    // --- Inbound ---

    fn typed<T, F>(&self, message_type: &'static str, callback: Arc<F>) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let role = self.role();
        self.manager.add_listener(message_type, move |data| {
            match serde_json::from_value::<T>(data.clone()) {
                Ok(payload) => callback(payload),
                Err(e) => warn!("[{role}] skipping unreadable {message_type} frame: {e}"),
            }
        })
    }

    /// Position updates from the other party of the ride.
    pub fn on_gps_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(GpsUpdate) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let types: &[&'static str] = match self.role() {
            UserRole::Driver => &["passenger_gps"],
            UserRole::Passenger => &["driver_gps", "driver_location_update"],
        };
        Subscription::merge(
            types
                .iter()
                .map(|t| self.typed::<GpsUpdate, F>(*t, callback.clone()))
                .collect(),
        )
    }

    pub fn on_chat_message<F>(&self, callback: F) -> Subscription
    where
        F: Fn(ChatMessage) + Send + Sync + 'static,
    {
        self.typed("chat_message", Arc::new(callback))
    }

    /// Ride status changes and cancellations, merged.
    pub fn on_ride_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(RideUpdate) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let on_status = callback.clone();
        let on_cancel = callback;
        Subscription::merge(vec![
            self.typed(
                "ride_status_update",
                Arc::new(move |update: RideStatusUpdate| on_status(RideUpdate::Status(update))),
            ),
            self.typed(
                "ride_cancellation",
                Arc::new(move |c: RideCancellation| on_cancel(RideUpdate::Cancelled(c))),
            ),
        ])
    }

    pub fn on_wallet_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(WalletBalanceUpdate) + Send + Sync + 'static,
    {
        self.typed("wallet_balance_update", Arc::new(callback))
    }
}
