//! GPS send throttling.

use std::time::Duration;

use rl_core::config::GpsThrottleConfig;
use rl_models::Coordinate;
use tokio::time::Instant;

/// Suppresses position sends that neither moved nor waited long enough.
///
/// A send is suppressed when the coordinate is within `epsilon_degrees` of
/// the last one sent on both axes *and* less than `min_interval_ms` has
/// passed since then. Without a config nothing is suppressed.
#[derive(Debug, Clone, Default)]
pub struct GpsThrottle {
    config: Option<GpsThrottleConfig>,
    last: Option<(Coordinate, Instant)>,
}

impl GpsThrottle {
    pub fn new(config: Option<GpsThrottleConfig>) -> Self {
        Self { config, last: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    pub fn suppresses(&self, position: &Coordinate, now: Instant) -> bool {
        let (Some(config), Some((last_position, last_sent))) = (&self.config, &self.last) else {
            return false;
        };
        position.within(last_position, config.epsilon_degrees)
            && now.saturating_duration_since(*last_sent)
                < Duration::from_millis(config.min_interval_ms)
    }

    /// Remember a position that was actually sent.
    pub fn record(&mut self, position: Coordinate, now: Instant) {
        self.last = Some((position, now));
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
