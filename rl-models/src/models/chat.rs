//! In-ride chat message model.

use serde::{Deserialize, Serialize};

use super::role::UserRole;

/// A chat line exchanged between the driver and passenger of a ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Client-generated id. Frames relayed by the server may omit it.
    #[serde(default)]
    pub id: String,
    pub sender_id: String,
    pub sender_type: UserRole,
    pub message: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub ride_id: String,
}

impl ChatMessage {
    /// Build an outgoing message stamped with the current time.
    ///
    /// Returns `None` when the text is empty after trimming.
    pub fn compose(
        ride_id: &str,
        sender_id: &str,
        sender_type: UserRole,
        text: &str,
    ) -> Option<Self> {
        let message = text.trim();
        if message.is_empty() {
            return None;
        }
        Some(Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            sender_type,
            message: message.to_string(),
            timestamp: crate::now_millis(),
            ride_id: ride_id.to_string(),
        })
    }

    /// Same timestamp, sender and text.
    pub fn same_content(&self, other: &ChatMessage) -> bool {
        self.timestamp == other.timestamp
            && self.sender_id == other.sender_id
            && self.message == other.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_trims_and_rejects_empty() {
        let msg = ChatMessage::compose("ride-1", "d-1", UserRole::Driver, "  on my way \n").unwrap();
        assert_eq!(msg.message, "on my way");
        assert_eq!(msg.ride_id, "ride-1");
        assert!(!msg.id.is_empty());
        assert!(msg.timestamp > 0);

        assert!(ChatMessage::compose("ride-1", "d-1", UserRole::Driver, "   ").is_none());
    }

    #[test]
    fn test_compose_ids_are_unique() {
        let a = ChatMessage::compose("r", "s", UserRole::Passenger, "hi").unwrap();
        let b = ChatMessage::compose("r", "s", UserRole::Passenger, "hi").unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_inbound_frame_without_id() {
        let msg: ChatMessage = serde_json::from_value(serde_json::json!({
            "type": "chat_message",
            "rideId": "ride-9",
            "senderId": "p-2",
            "senderType": "passenger",
            "message": "hello",
            "timestamp": 1_700_000_000_000i64,
        }))
        .unwrap();
        assert_eq!(msg.id, "");
        assert_eq!(msg.sender_type, UserRole::Passenger);
    }
}
