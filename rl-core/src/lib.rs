//! RideLink Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other RideLink crates:
//! - Application configuration (endpoints, per-role socket policy, identity rules)
//! - Global error types covering all error categories
//! - Structured logging with tracing
//! - Config, credential and log file locations
//! - Common constants

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;
pub mod constants;

// Re-export commonly used items at the crate root
pub use config::{AppConfig, ConfigHandle};
pub use error::{RlError, RlResult};
pub use logging::init_logging;
pub use paths::AppDirs;
