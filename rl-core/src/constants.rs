//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "RideLink";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default REST API timeout in milliseconds.
pub const DEFAULT_API_TIMEOUT_MS: u64 = 30_000;

/// Default limit for the WebSocket opening handshake in milliseconds.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

/// Close code sent on a deliberate local disconnect (RFC 6455 normal closure).
pub const NORMAL_CLOSURE_CODE: u16 = 1000;

/// Close reason sent on a deliberate local disconnect.
pub const MANUAL_DISCONNECT_REASON: &str = "manual disconnect";

/// Listener key that receives every inbound frame.
pub const WILDCARD_MESSAGE_TYPE: &str = "*";

/// Capacity of the per-manager inbound event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Fixed key the credential blob is stored under.
pub const CREDENTIAL_KEY: &str = "ridelink.credentials";

/// Per-role connection defaults.
pub mod driver {
    pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;
    pub const RECONNECT_DELAY_MS: u64 = 1_000;
    pub const CONNECT_COOLDOWN_MS: u64 = 3_000;
    pub const HEARTBEAT_INTERVAL_MS: u64 = 30_000;
    /// Coordinates closer than this (degrees) count as "not moved".
    pub const GPS_EPSILON_DEGREES: f64 = 0.00001;
    pub const GPS_MIN_INTERVAL_MS: u64 = 1_000;
}

/// Per-role connection defaults.
pub mod passenger {
    pub const MAX_RECONNECT_ATTEMPTS: u32 = 15;
    pub const RECONNECT_DELAY_MS: u64 = 1_500;
    pub const CONNECT_COOLDOWN_MS: u64 = 500;
}

/// Delay between tearing down one identity's socket and opening the next.
pub const SWITCH_USER_GUARD_MS: u64 = 100;

/// Session header names attached to REST calls.
pub mod headers {
    pub const SESSION_PHONE: &str = "x-session-phone";
    pub const SESSION_DRIVER_ID: &str = "x-session-driver-id";
    pub const SESSION_PASSENGER_ID: &str = "x-session-passenger-id";
}
