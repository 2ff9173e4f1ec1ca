//! RideLink Models - Data types shared by the socket, API and service crates.
//!
//! Covers the stored credential record, user roles, chat messages, the
//! outbound socket frame format and the typed payloads of inbound frames.

pub mod frames;
pub mod models;

// Re-export key types
pub use frames::OutboundFrame;
pub use models::chat::ChatMessage;
pub use models::credential::Credential;
pub use models::gps::{Coordinate, GpsUpdate};
pub use models::ride::{RideCancellation, RideStatusUpdate, RideUpdate};
pub use models::role::UserRole;
pub use models::wallet::WalletBalanceUpdate;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
