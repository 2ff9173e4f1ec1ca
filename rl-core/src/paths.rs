//! On-disk locations for config, credentials and logs.

use std::path::PathBuf;

use crate::error::{RlError, RlResult};

/// Overrides every location with a single root directory when set.
pub const HOME_ENV: &str = "RIDELINK_HOME";

const APP_DIR: &str = "RideLink";

/// Resolved configuration and data directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppDirs {
    /// `$RIDELINK_HOME` if set, otherwise the OS config and data dirs
    /// (`~/.config/RideLink`, `~/Library/Application Support/RideLink`,
    /// `%APPDATA%\RideLink`, ...).
    pub fn resolve() -> RlResult<Self> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::rooted(home));
        }
        let config = dirs::config_dir()
            .ok_or_else(|| RlError::Config("could not determine config directory".into()))?;
        let data = dirs::data_dir()
            .ok_or_else(|| RlError::Config("could not determine data directory".into()))?;
        Ok(Self {
            config_dir: config.join(APP_DIR),
            data_dir: data.join(APP_DIR),
        })
    }

    /// Everything under one directory.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_dir: root.clone(),
            data_dir: root,
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn credential_file(&self) -> PathBuf {
        self.data_dir.join("credentials.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rooted_layout() {
        let dirs = AppDirs::rooted("/tmp/rl");
        assert_eq!(dirs.config_file(), PathBuf::from("/tmp/rl/config.toml"));
        assert_eq!(dirs.credential_file(), PathBuf::from("/tmp/rl/credentials.json"));
        assert_eq!(dirs.log_dir(), PathBuf::from("/tmp/rl/logs"));
    }
}
