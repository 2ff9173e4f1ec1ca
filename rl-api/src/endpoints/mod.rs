//! API endpoint modules organized by category.
//!
//! Each module adds typed methods for a group of related endpoints to
//! `AuthClient`.

pub mod auth;
