//! RideLink API - authenticated REST client for the ride-hailing backend.
//!
//! This crate provides:
//! - The credential store contract with in-memory and file-backed stores
//! - `AuthClient`, which attaches bearer and session headers and performs a
//!   single shared token refresh when requests come back 401
//! - OTP login endpoints
//! - `AuthSession`, the in-memory view of who is logged in

pub mod client;
pub mod credentials;
pub mod endpoints;
pub mod response;
pub mod session;

// Re-export key types
pub use client::AuthClient;
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use response::TokenPair;
pub use session::{AuthSession, SessionState};
pub use reqwest::Method;
