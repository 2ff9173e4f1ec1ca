//! Global error types for the RideLink client.
//!
//! All error categories across the workspace are unified into a single
//! `RlError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using RlError.
pub type RlResult<T> = Result<T, RlError>;

/// Unified error type covering all error categories in RideLink.
#[derive(Error, Debug)]
pub enum RlError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Network errors --
    /// HTTP request failed.
    #[error("http error: {0}")]
    Http(String),

    /// HTTP request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Server returned an error response.
    #[error("server error (status {status}): {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Error message from server.
        message: String,
    },

    // -- Socket errors --
    /// WebSocket transport error.
    #[error("socket error: {0}")]
    Socket(String),

    /// The socket is not open.
    #[error("socket not connected")]
    NotConnected,

    // -- Auth errors --
    /// The request was rejected as unauthenticated.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Exchanging the refresh token for a new access token failed.
    #[error("token refresh failed: {0}")]
    TokenRefresh(String),

    /// Credential record violates its invariants.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    // -- Storage/IO errors --
    /// Credential store read or write failed.
    #[error("credential store error: {0}")]
    Storage(String),

    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// Caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RlError {
    /// Whether this error means the session must go back through login.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Self::TokenRefresh(_) | Self::InvalidCredential(_)
        )
    }
}

impl From<serde_json::Error> for RlError {
    fn from(e: serde_json::Error) -> Self {
        RlError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RlError {
    fn from(e: toml::de::Error) -> Self {
        RlError::Config(e.to_string())
    }
}
