//! Outbound socket frame format.
//!
//! Every frame is a JSON object with a `type` discriminator and camelCase
//! fields, e.g. `{"type":"driver_connect","driverId":"d-1"}`.

use serde::Serialize;

use crate::models::chat::ChatMessage;
use crate::models::gps::Coordinate;
use crate::models::role::UserRole;

/// Frames the client writes to the socket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OutboundFrame {
    DriverConnect {
        driver_id: String,
    },
    PassengerConnect {
        passenger_id: String,
    },
    Heartbeat {
        driver_id: String,
    },
    DriverGps {
        user_id: String,
        latitude: f64,
        longitude: f64,
        timestamp: i64,
    },
    PassengerGps {
        user_id: String,
        latitude: f64,
        longitude: f64,
        timestamp: i64,
    },
    ChatMessage {
        ride_id: String,
        sender_id: String,
        sender_type: UserRole,
        message: String,
        timestamp: i64,
    },
}

impl OutboundFrame {
    /// Identity announcement sent once per successful open.
    pub fn connect(role: UserRole, user_id: &str) -> Self {
        match role {
            UserRole::Driver => Self::DriverConnect {
                driver_id: user_id.to_string(),
            },
            UserRole::Passenger => Self::PassengerConnect {
                passenger_id: user_id.to_string(),
            },
        }
    }

    pub fn heartbeat(driver_id: &str) -> Self {
        Self::Heartbeat {
            driver_id: driver_id.to_string(),
        }
    }

    pub fn gps(role: UserRole, user_id: &str, position: Coordinate, timestamp: i64) -> Self {
        let user_id = user_id.to_string();
        match role {
            UserRole::Driver => Self::DriverGps {
                user_id,
                latitude: position.latitude,
                longitude: position.longitude,
                timestamp,
            },
            UserRole::Passenger => Self::PassengerGps {
                user_id,
                latitude: position.latitude,
                longitude: position.longitude,
                timestamp,
            },
        }
    }

    pub fn chat(message: &ChatMessage) -> Self {
        Self::ChatMessage {
            ride_id: message.ride_id.clone(),
            sender_id: message.sender_id.clone(),
            sender_type: message.sender_type,
            message: message.message.clone(),
            timestamp: message.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connect_frames() {
        let frame = OutboundFrame::connect(UserRole::Driver, "d-1");
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "driver_connect", "driverId": "d-1"})
        );
        let frame = OutboundFrame::connect(UserRole::Passenger, "p-1");
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "passenger_connect", "passengerId": "p-1"})
        );
    }

    #[test]
    fn test_heartbeat_frame() {
        assert_eq!(
            serde_json::to_value(OutboundFrame::heartbeat("d-1")).unwrap(),
            json!({"type": "heartbeat", "driverId": "d-1"})
        );
    }

    #[test]
    fn test_gps_frame() {
        let frame = OutboundFrame::gps(UserRole::Passenger, "p-3", Coordinate::new(1.0, 2.0), 42);
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "passenger_gps", "userId": "p-3", "latitude": 1.0, "longitude": 2.0, "timestamp": 42})
        );
    }

    #[test]
    fn test_chat_frame() {
        let msg = ChatMessage {
            id: "m-1".into(),
            sender_id: "d-1".into(),
            sender_type: UserRole::Driver,
            message: "hello".into(),
            timestamp: 7,
            ride_id: "ride-9".into(),
        };
        assert_eq!(
            serde_json::to_value(OutboundFrame::chat(&msg)).unwrap(),
            json!({
                "type": "chat_message",
                "rideId": "ride-9",
                "senderId": "d-1",
                "senderType": "driver",
                "message": "hello",
                "timestamp": 7,
            })
        );
    }
}
