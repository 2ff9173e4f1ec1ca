//! Entity and payload models.

pub mod chat;
pub mod credential;
pub mod gps;
pub mod ride;
pub mod role;
pub mod wallet;
