//! Socket message types, connection state and the broadcast dispatcher.
//!
//! Inbound frames are JSON objects discriminated by a `type` field. Known
//! types map to `MessageType` variants; everything else is kept as
//! `Unknown` so wildcard consumers still see it.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Message types the backend sends over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// A driver's position (`driver_gps`).
    DriverGps,
    /// A passenger's position (`passenger_gps`).
    PassengerGps,
    /// Server-computed driver position for a ride (`driver_location_update`).
    DriverLocationUpdate,
    /// In-ride chat line (`chat_message`).
    ChatMessage,
    /// Ride lifecycle change (`ride_status_update`).
    RideStatusUpdate,
    /// Ride was cancelled (`ride_cancellation`).
    RideCancellation,
    /// Wallet balance changed (`wallet_balance_update`).
    WalletBalanceUpdate,
    /// Unknown/unhandled message type.
    Unknown(String),
}

impl MessageType {
    /// Parse a `type` string from the server.
    pub fn from_str(s: &str) -> Self {
        match s {
            "driver_gps" => Self::DriverGps,
            "passenger_gps" => Self::PassengerGps,
            "driver_location_update" => Self::DriverLocationUpdate,
            "chat_message" => Self::ChatMessage,
            "ride_status_update" => Self::RideStatusUpdate,
            "ride_cancellation" => Self::RideCancellation,
            "wallet_balance_update" => Self::WalletBalanceUpdate,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Convert to the wire string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::DriverGps => "driver_gps",
            Self::PassengerGps => "passenger_gps",
            Self::DriverLocationUpdate => "driver_location_update",
            Self::ChatMessage => "chat_message",
            Self::RideStatusUpdate => "ride_status_update",
            Self::RideCancellation => "ride_cancellation",
            Self::WalletBalanceUpdate => "wallet_balance_update",
            Self::Unknown(s) => s.as_str(),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed inbound frame.
#[derive(Debug, Clone)]
pub struct SocketEvent {
    /// The frame's `type`, or `Unknown("")` when absent.
    pub message_type: MessageType,
    /// The full parsed frame.
    pub data: serde_json::Value,
}

/// Broadcast-based event dispatcher for async consumers.
///
/// Every inbound frame is published here in addition to the callback
/// listeners. Slow receivers that fall behind get `RecvError::Lagged`.
#[derive(Clone)]
pub struct EventDispatcher {
    sender: broadcast::Sender<SocketEvent>,
}

impl EventDispatcher {
    /// Create a new EventDispatcher with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to receive socket events.
    pub fn subscribe(&self) -> broadcast::Receiver<SocketEvent> {
        self.sender.subscribe()
    }

    /// Dispatch an event to all active subscribers.
    pub fn dispatch(&self, event: SocketEvent) {
        let message_type = event.message_type.as_str().to_string();
        match self.sender.send(event) {
            Ok(count) => {
                debug!("dispatched {message_type} to {count} subscriber(s)");
            }
            Err(_) => {
                debug!("no subscribers for event {message_type}");
            }
        }
    }
}

/// Coarse lifecycle of a manager, published on a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket and no pending attempt.
    Disconnected,
    /// A socket is opening.
    Connecting,
    /// The socket is open and identified.
    Connected,
    /// Connection lost, a retry is scheduled or opening.
    Reconnecting,
    /// Retry budget exhausted; only an explicit connect restarts.
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot returned by `status()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub current_user_id: Option<String>,
    pub connection_error: Option<String>,
    pub reconnect_attempts: u32,
}
