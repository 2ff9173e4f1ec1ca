//! RideLink Socket - per-role WebSocket connection management.
//!
//! This crate provides the connection manager that keeps one socket per
//! role (driver or passenger) alive:
//! - Identity announcement on open and a driver heartbeat
//! - Idempotent connect, identity switching with a guard delay, connect cooldown
//! - Bounded reconnection through a pluggable delay policy
//! - Inbound frame fan-out to type-keyed and wildcard listeners
//! - A broadcast dispatcher and state watch channel for async consumers

pub mod events;
pub mod listeners;
pub mod manager;
pub mod policy;
pub mod transport;

// Re-export key types
pub use events::{
    ConnectionState, ConnectionStatus, EventDispatcher, MessageType, SocketEvent,
};
pub use listeners::{ListenerId, ListenerRegistry, Subscription};
pub use manager::{ConnectOutcome, ConnectionManager, ManagerBuilder};
pub use policy::{ExponentialBackoff, FixedDelay, IdentityFilter, IdentityRejection, ReconnectPolicy};
pub use transport::{
    LoopbackPeer, LoopbackTransport, SocketConnection, SocketSink, Transport, TransportEvent,
    WsTransport,
};
