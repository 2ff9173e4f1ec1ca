//! Application configuration management.
//!
//! Handles loading, saving, and accessing configuration: backend endpoints,
//! per-role socket policy, identity filtering rules, credential storage and
//! logging. Configuration is persisted as TOML on disk.
//!
//! Per-role socket settings are written as sparse override tables; anything
//! not set falls back to that role's built-in defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{RlError, RlResult};
use crate::paths::AppDirs;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend endpoints.
    #[serde(default)]
    pub server: ServerConfig,

    /// Real-time socket settings.
    #[serde(default)]
    pub socket: SocketConfig,

    /// Credential storage settings.
    #[serde(default)]
    pub credentials: CredentialConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// REST API base URL (e.g., "https://api.example.com/api").
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// WebSocket endpoint (e.g., "wss://api.example.com/ws").
    #[serde(default = "default_socket_url")]
    pub socket_url: String,

    /// API request timeout in milliseconds.
    #[serde(default = "default_api_timeout")]
    pub api_timeout_ms: u64,

    /// Path of the token refresh endpoint, relative to `api_base_url`.
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Limit for the WebSocket opening handshake in milliseconds.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,
}

/// Socket configuration shared by both role managers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocketConfig {
    /// Driver-role overrides.
    #[serde(default)]
    pub driver: RoleSocketOverrides,

    /// Passenger-role overrides.
    #[serde(default)]
    pub passenger: RoleSocketOverrides,

    /// Identity filtering applied before any connect attempt.
    #[serde(default)]
    pub identity: IdentityConfig,
}

/// How reconnect delays grow between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectStrategy {
    /// Same delay before every attempt.
    Fixed,
    /// Doubling delay with jitter, capped.
    Exponential,
}

/// Duplicate suppression rule for the chat timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatDedup {
    /// Drop a message whose timestamp, sender and text all match an existing entry.
    ContentMatch,
    /// Append every message.
    AppendAll,
}

/// Suppression window for redundant GPS sends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsThrottleConfig {
    /// Max per-axis coordinate delta (degrees) still treated as "same position".
    pub epsilon_degrees: f64,
    /// Minimum time between two sends of the same position.
    pub min_interval_ms: u64,
}

/// Fully resolved socket policy for one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSocketConfig {
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    pub reconnect_strategy: ReconnectStrategy,
    /// Minimum gap between two caller-initiated connect attempts.
    pub connect_cooldown_ms: u64,
    /// Delay between tearing down one identity and connecting the next.
    pub switch_guard_ms: u64,
    /// `None` disables the heartbeat.
    pub heartbeat_interval_ms: Option<u64>,
    /// `None` disables GPS send suppression.
    pub gps_throttle: Option<GpsThrottleConfig>,
    pub chat_dedup: ChatDedup,
}

/// Sparse per-role overrides as written in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleSocketOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reconnect_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reconnect_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_strategy: Option<ReconnectStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_cooldown_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_guard_ms: Option<u64>,
    /// 0 disables the heartbeat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_throttle_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_epsilon_degrees: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_min_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_dedup: Option<ChatDedup>,
}

/// Identifiers filtered out before a socket is ever opened.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Known-stale or phantom identifiers, dropped for both roles.
    #[serde(default)]
    pub denylist: Vec<String>,

    /// Ids known to be drivers; the passenger manager refuses them.
    #[serde(default)]
    pub driver_ids: Vec<String>,

    /// Ids known to be passengers; the driver manager refuses them.
    #[serde(default)]
    pub passenger_ids: Vec<String>,
}

/// Credential storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Path to the credential file. If empty, uses the default location.
    #[serde(default)]
    pub path: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter: trace, debug, info, warn, error or an EnvFilter directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output.
    #[serde(default)]
    pub json_output: bool,
}

// Default value functions for serde

fn default_api_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_socket_url() -> String {
    "ws://localhost:3000/ws".to_string()
}

fn default_api_timeout() -> u64 {
    constants::DEFAULT_API_TIMEOUT_MS
}

fn default_handshake_timeout() -> u64 {
    constants::DEFAULT_HANDSHAKE_TIMEOUT_MS
}

fn default_refresh_path() -> String {
    "/auth/refresh-token".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            socket_url: default_socket_url(),
            api_timeout_ms: default_api_timeout(),
            refresh_path: default_refresh_path(),
            handshake_timeout_ms: default_handshake_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl RoleSocketConfig {
    /// Built-in driver policy: fewer retries, long cooldown, heartbeat and GPS throttle.
    pub fn driver_defaults() -> Self {
        Self {
            max_reconnect_attempts: constants::driver::MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_ms: constants::driver::RECONNECT_DELAY_MS,
            max_reconnect_delay_ms: 30_000,
            reconnect_strategy: ReconnectStrategy::Fixed,
            connect_cooldown_ms: constants::driver::CONNECT_COOLDOWN_MS,
            switch_guard_ms: constants::SWITCH_USER_GUARD_MS,
            heartbeat_interval_ms: Some(constants::driver::HEARTBEAT_INTERVAL_MS),
            gps_throttle: Some(GpsThrottleConfig {
                epsilon_degrees: constants::driver::GPS_EPSILON_DEGREES,
                min_interval_ms: constants::driver::GPS_MIN_INTERVAL_MS,
            }),
            chat_dedup: ChatDedup::ContentMatch,
        }
    }

    /// Built-in passenger policy: more retries, short cooldown, no heartbeat or throttle.
    pub fn passenger_defaults() -> Self {
        Self {
            max_reconnect_attempts: constants::passenger::MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_ms: constants::passenger::RECONNECT_DELAY_MS,
            max_reconnect_delay_ms: 30_000,
            reconnect_strategy: ReconnectStrategy::Fixed,
            connect_cooldown_ms: constants::passenger::CONNECT_COOLDOWN_MS,
            switch_guard_ms: constants::SWITCH_USER_GUARD_MS,
            heartbeat_interval_ms: None,
            gps_throttle: None,
            chat_dedup: ChatDedup::AppendAll,
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_cooldown(&self) -> Duration {
        Duration::from_millis(self.connect_cooldown_ms)
    }

    pub fn switch_guard(&self) -> Duration {
        Duration::from_millis(self.switch_guard_ms)
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval_ms.map(Duration::from_millis)
    }
}

impl RoleSocketOverrides {
    /// Layer these overrides on top of a role's defaults.
    pub fn apply(&self, mut base: RoleSocketConfig) -> RoleSocketConfig {
        if let Some(v) = self.max_reconnect_attempts {
            base.max_reconnect_attempts = v;
        }
        if let Some(v) = self.reconnect_delay_ms {
            base.reconnect_delay_ms = v;
        }
        if let Some(v) = self.max_reconnect_delay_ms {
            base.max_reconnect_delay_ms = v;
        }
        if let Some(v) = self.reconnect_strategy {
            base.reconnect_strategy = v;
        }
        if let Some(v) = self.connect_cooldown_ms {
            base.connect_cooldown_ms = v;
        }
        if let Some(v) = self.switch_guard_ms {
            base.switch_guard_ms = v;
        }
        if let Some(v) = self.heartbeat_interval_ms {
            base.heartbeat_interval_ms = (v > 0).then_some(v);
        }
        if let Some(v) = self.chat_dedup {
            base.chat_dedup = v;
        }

        match self.gps_throttle_enabled {
            Some(false) => base.gps_throttle = None,
            Some(true) if base.gps_throttle.is_none() => {
                base.gps_throttle = Some(GpsThrottleConfig {
                    epsilon_degrees: constants::driver::GPS_EPSILON_DEGREES,
                    min_interval_ms: constants::driver::GPS_MIN_INTERVAL_MS,
                });
            }
            _ => {}
        }
        if let Some(throttle) = base.gps_throttle.as_mut() {
            if let Some(v) = self.gps_epsilon_degrees {
                throttle.epsilon_degrees = v;
            }
            if let Some(v) = self.gps_min_interval_ms {
                throttle.min_interval_ms = v;
            }
        }

        base
    }
}

impl SocketConfig {
    /// Resolved driver policy.
    pub fn driver_policy(&self) -> RoleSocketConfig {
        self.driver.apply(RoleSocketConfig::driver_defaults())
    }

    /// Resolved passenger policy.
    pub fn passenger_policy(&self) -> RoleSocketConfig {
        self.passenger.apply(RoleSocketConfig::passenger_defaults())
    }
}

impl IdentityConfig {
    /// Denylist as a lookup set.
    pub fn denied(&self) -> HashSet<String> {
        self.denylist.iter().cloned().collect()
    }
}

impl AppConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> RlResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> RlResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> RlResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RlError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> RlResult<PathBuf> {
        Ok(AppDirs::resolve()?.config_file())
    }

    /// Get the effective credential file path, using the configured path or the default.
    pub fn effective_credential_path(&self) -> RlResult<PathBuf> {
        if self.credentials.path.is_empty() {
            Ok(AppDirs::resolve()?.credential_file())
        } else {
            Ok(PathBuf::from(&self.credentials.path))
        }
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> RlResult<PathBuf> {
        if self.logging.directory.is_empty() {
            Ok(AppDirs::resolve()?.log_dir())
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Reject configurations the client cannot run with.
    pub fn validate(&self) -> RlResult<()> {
        if self.server.api_base_url.trim().is_empty() {
            return Err(RlError::MissingConfig("server.api_base_url".into()));
        }
        let socket_url = self.server.socket_url.trim();
        if !(socket_url.starts_with("ws://") || socket_url.starts_with("wss://")) {
            return Err(RlError::Config(format!(
                "server.socket_url must use ws:// or wss://, got {socket_url:?}"
            )));
        }
        Ok(())
    }
}

/// Thread-safe configuration holder for shared access across services.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
}

impl ConfigHandle {
    /// Create a new configuration handle.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    /// Write/update the configuration.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }

    /// Clone out the current configuration.
    pub async fn snapshot(&self) -> AppConfig {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.api_timeout_ms, 30_000);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_role_defaults_resolve() {
        let socket = SocketConfig::default();
        let driver = socket.driver_policy();
        assert_eq!(driver.max_reconnect_attempts, 10);
        assert_eq!(driver.reconnect_delay_ms, 1_000);
        assert_eq!(driver.connect_cooldown_ms, 3_000);
        assert_eq!(driver.heartbeat_interval_ms, Some(30_000));
        assert!(driver.gps_throttle.is_some());
        assert_eq!(driver.chat_dedup, ChatDedup::ContentMatch);

        let passenger = socket.passenger_policy();
        assert_eq!(passenger.max_reconnect_attempts, 15);
        assert_eq!(passenger.reconnect_delay_ms, 1_500);
        assert_eq!(passenger.connect_cooldown_ms, 500);
        assert_eq!(passenger.heartbeat_interval_ms, None);
        assert!(passenger.gps_throttle.is_none());
        assert_eq!(passenger.chat_dedup, ChatDedup::AppendAll);
    }

    #[test]
    fn test_sparse_overrides_from_toml() {
        let toml_src = r#"
            [socket.driver]
            max_reconnect_attempts = 3
            heartbeat_interval_ms = 0

            [socket.passenger]
            chat_dedup = "content_match"
            gps_throttle_enabled = true
            gps_min_interval_ms = 2500

            [socket.identity]
            denylist = ["ghost-1"]
            passenger_ids = ["p-7"]
        "#;
        let config: AppConfig = toml::from_str(toml_src).unwrap();

        let driver = config.socket.driver_policy();
        assert_eq!(driver.max_reconnect_attempts, 3);
        assert_eq!(driver.reconnect_delay_ms, 1_000);
        assert_eq!(driver.heartbeat_interval_ms, None);

        let passenger = config.socket.passenger_policy();
        assert_eq!(passenger.chat_dedup, ChatDedup::ContentMatch);
        let throttle = passenger.gps_throttle.unwrap();
        assert_eq!(throttle.min_interval_ms, 2_500);

        assert!(config.socket.identity.denied().contains("ghost-1"));
        assert_eq!(config.socket.identity.passenger_ids, vec!["p-7".to_string()]);
    }

    #[test]
    fn test_validate_rejects_http_socket_url() {
        let mut config = AppConfig::default();
        config.server.socket_url = "http://localhost:3000/ws".into();
        assert!(matches!(config.validate(), Err(RlError::Config(_))));
    }

    #[test]
    fn test_roundtrip_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.socket.driver.reconnect_delay_ms = Some(250);
        config.save_to_file(&path).unwrap();

        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.socket.driver_policy().reconnect_delay_ms, 250);
        assert_eq!(loaded.server.api_base_url, config.server.api_base_url);
    }
}
