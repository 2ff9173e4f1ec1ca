//! Reconnect delay policies and identity filtering.

use std::collections::HashSet;
use std::time::Duration;

use rl_core::config::{IdentityConfig, ReconnectStrategy, RoleSocketConfig};
use rl_models::UserRole;

/// Decides how long to wait before reconnect attempt `attempt` (1-based).
pub trait ReconnectPolicy: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

/// The same delay before every attempt.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl ReconnectPolicy for FixedDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Doubling delay with +/- jitter, capped at `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Jitter factor (0.0 to 1.0) applied to each delay.
    pub jitter_factor: f64,
}

impl ReconnectPolicy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64();
        let exponent = attempt.saturating_sub(1).min(30) as i32;

        let exponential = (base * 2.0_f64.powi(exponent)).min(max);
        let jitter_range = exponential * self.jitter_factor.clamp(0.0, 1.0);
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;

        Duration::from_secs_f64((exponential + jitter).max(0.0))
    }
}

/// Build the policy a role's configuration asks for.
pub fn policy_for(config: &RoleSocketConfig) -> Box<dyn ReconnectPolicy> {
    match config.reconnect_strategy {
        ReconnectStrategy::Fixed => Box::new(FixedDelay(config.reconnect_delay())),
        ReconnectStrategy::Exponential => Box::new(ExponentialBackoff {
            base_delay: config.reconnect_delay(),
            max_delay: Duration::from_millis(config.max_reconnect_delay_ms),
            jitter_factor: 0.3,
        }),
    }
}

/// Why an identifier was refused before opening a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityRejection {
    Empty,
    Denylisted,
    /// The id is registered to the other role.
    WrongRole,
}

impl std::fmt::Display for IdentityRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty id"),
            Self::Denylisted => write!(f, "denylisted id"),
            Self::WrongRole => write!(f, "id belongs to the other role"),
        }
    }
}

/// Per-manager view of the identity rules.
#[derive(Debug, Clone, Default)]
pub struct IdentityFilter {
    denylist: HashSet<String>,
    foreign: HashSet<String>,
}

impl IdentityFilter {
    pub fn for_role(role: UserRole, config: &IdentityConfig) -> Self {
        let foreign = match role {
            UserRole::Driver => &config.passenger_ids,
            UserRole::Passenger => &config.driver_ids,
        };
        Self {
            denylist: config.denied(),
            foreign: foreign.iter().cloned().collect(),
        }
    }

    pub fn check(&self, user_id: &str) -> Result<(), IdentityRejection> {
        if user_id.trim().is_empty() {
            return Err(IdentityRejection::Empty);
        }
        if self.denylist.contains(user_id) {
            return Err(IdentityRejection::Denylisted);
        }
        if self.foreign.contains(user_id) {
            return Err(IdentityRejection::WrongRole);
        }
        Ok(())
    }
}
