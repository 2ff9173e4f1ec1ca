//! Ride lifecycle payloads.

use serde::{Deserialize, Serialize};

/// `ride_status_update` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideStatusUpdate {
    pub ride_id: String,
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Any further fields the backend attaches (fare, eta, driver details).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `ride_cancellation` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideCancellation {
    pub ride_id: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub cancelled_by: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Either kind of ride lifecycle change, as delivered to ride-update subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum RideUpdate {
    Status(RideStatusUpdate),
    Cancelled(RideCancellation),
}

impl RideUpdate {
    pub fn ride_id(&self) -> &str {
        match self {
            Self::Status(s) => &s.ride_id,
            Self::Cancelled(c) => &c.ride_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Cancelled(_) => true,
            Self::Status(s) => matches!(s.status.as_str(), "completed" | "cancelled"),
        }
    }
}
