//! Per-ride chat sessions: ordering, ride filtering and echo handling.

mod common;

use rl_models::UserRole;
use rl_services::ChatSession;
use serde_json::json;

use common::{create_channel, open_channel, settle};

fn chat_frame(ride: &str, sender: &str, text: &str, ts: i64) -> serde_json::Value {
    json!({
        "type": "chat_message",
        "rideId": ride,
        "senderId": sender,
        "senderType": "passenger",
        "message": text,
        "timestamp": ts,
    })
}

#[tokio::test(start_paused = true)]
async fn inbound_messages_are_ordered_by_timestamp() {
    let (channel, transport) = create_channel(UserRole::Driver);
    let session = ChatSession::open(&channel, "ride-1");
    let peer = open_channel(&channel, &transport, "drv-1").await;

    peer.push_json(&chat_frame("ride-1", "pas-1", "third", 300));
    peer.push_json(&chat_frame("ride-1", "pas-1", "first", 100));
    peer.push_json(&chat_frame("ride-1", "pas-1", "second", 200));
    settle().await;

    let texts: Vec<String> = session.messages().into_iter().map(|m| m.message).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
}

#[tokio::test(start_paused = true)]
async fn other_rides_are_ignored() {
    let (channel, transport) = create_channel(UserRole::Driver);
    let session = ChatSession::open(&channel, "ride-1");
    let peer = open_channel(&channel, &transport, "drv-1").await;

    peer.push_json(&chat_frame("ride-2", "pas-9", "wrong ride", 100));
    settle().await;
    assert!(session.is_empty());
    assert_eq!(session.ride_id(), "ride-1");
}

#[tokio::test(start_paused = true)]
async fn driver_drops_server_echo_of_own_message() {
    let (channel, transport) = create_channel(UserRole::Driver);
    let session = ChatSession::open(&channel, "ride-1");
    let peer = open_channel(&channel, &transport, "drv-1").await;

    assert!(session.send("on my way").await);
    assert_eq!(session.len(), 1);

    let echo = peer.sent_of_type("chat_message").remove(0);
    peer.push_json(&echo);
    settle().await;
    assert_eq!(session.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn passenger_keeps_every_delivery() {
    let (channel, transport) = create_channel(UserRole::Passenger);
    let session = ChatSession::open(&channel, "ride-1");
    let peer = open_channel(&channel, &transport, "pas-1").await;

    peer.push_json(&chat_frame("ride-1", "drv-1", "here", 100));
    peer.push_json(&chat_frame("ride-1", "drv-1", "here", 100));
    settle().await;
    assert_eq!(session.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_send_is_not_recorded() {
    let (channel, _transport) = create_channel(UserRole::Passenger);
    let session = ChatSession::open(&channel, "ride-1");

    assert!(!session.send("hello").await);
    assert!(session.is_empty());
}

#[tokio::test(start_paused = true)]
async fn closing_session_stops_listening() {
    let (channel, _transport) = create_channel(UserRole::Driver);
    let session = ChatSession::open(&channel, "ride-1");
    assert_eq!(channel.manager().listener_count("chat_message"), 1);

    drop(session);
    assert_eq!(channel.manager().listener_count("chat_message"), 0);
}
