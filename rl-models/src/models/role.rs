//! User role model.

use serde::{Deserialize, Serialize};
use rl_core::error::RlError;

/// Which side of a ride a session belongs to.
///
/// Each role owns an independent socket manager; the role also decides the
/// wire names of the identity announcement and GPS frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Driver,
    Passenger,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Passenger => "passenger",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = RlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "driver" => Ok(Self::Driver),
            "passenger" => Ok(Self::Passenger),
            other => Err(RlError::InvalidArgument(format!("unknown role: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("driver".parse::<UserRole>().unwrap(), UserRole::Driver);
        assert_eq!(" Passenger ".parse::<UserRole>().unwrap(), UserRole::Passenger);
        assert!("admin".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_wire_name() {
        assert_eq!(UserRole::Driver.to_string(), "driver");
        assert_eq!(serde_json::to_string(&UserRole::Passenger).unwrap(), "\"passenger\"");
    }
}
