//! RideLink Services - role-facing façade over the socket layer.
//!
//! This crate provides:
//! - `EventChannel`, the per-role API for GPS, chat, ride and wallet events
//! - GPS send throttling
//! - A timestamp-ordered chat timeline with configurable de-duplication
//! - Per-ride chat sessions
//! - `ChannelRegistry`, which builds each role's channel once and shares it

pub mod channel;
pub mod chat;
pub mod registry;
pub mod throttle;

// Re-export key types
pub use channel::EventChannel;
pub use chat::{ChatSession, ChatTimeline};
pub use registry::ChannelRegistry;
pub use throttle::GpsThrottle;
