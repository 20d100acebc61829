//! Configuration for the damping subprotocol.
//!
//! Key spellings on the wire follow the recognized configuration surface
//! (`dampReqNVal`, `dampScoringSuppressLimit`, ...); durations are
//! milliseconds there and [`Duration`]s in code.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Damping subprotocol configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DampingConfig {
    /// Fan-out width: observers contacted per subprotocol round
    pub damp_req_n_val: usize,

    /// Quorum size: successful responses required per round
    pub damp_req_r_val: usize,

    /// Damp score at or above which an observer votes "suppress"
    pub damp_scoring_suppress_limit: f64,

    /// How long a damped member stays suppressed, in milliseconds
    pub damp_scoring_suppress_duration: u64,

    /// Interval between expiration scans, in milliseconds
    pub damped_member_expiration_interval: u64,

    /// Interval between subprotocol initiations, in milliseconds
    pub damp_timer_interval: u64,

    /// Cluster-wide cap on the damped fraction, in [0, 1]
    pub damped_max_percentage: f64,
}

impl Default for DampingConfig {
    fn default() -> Self {
        Self {
            damp_req_n_val: 3,
            damp_req_r_val: 3,
            damp_scoring_suppress_limit: 5_000.0, // BGP-style suppress threshold
            damp_scoring_suppress_duration: 30 * 60 * 1000, // 30 minutes
            damped_member_expiration_interval: 5_000,
            damp_timer_interval: 1_000,
            damped_max_percentage: 0.25,
        }
    }
}

impl DampingConfig {
    /// How long a damped entry persists before release
    pub fn suppress_duration(&self) -> Duration {
        Duration::from_millis(self.damp_scoring_suppress_duration)
    }

    /// Interval between expiration scans
    pub fn expiration_interval(&self) -> Duration {
        Duration::from_millis(self.damped_member_expiration_interval)
    }

    /// Interval between subprotocol initiations
    pub fn damp_timer_interval(&self) -> Duration {
        Duration::from_millis(self.damp_timer_interval)
    }

    /// Reject configurations the subprotocol cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.damp_req_n_val == 0 {
            return Err(Error::Config {
                field: "dampReqNVal".to_string(),
                message: "fan-out width must be at least 1".to_string(),
            });
        }
        if self.damp_req_r_val == 0 {
            return Err(Error::Config {
                field: "dampReqRVal".to_string(),
                message: "quorum size must be at least 1".to_string(),
            });
        }
        if self.damp_req_r_val > self.damp_req_n_val {
            return Err(Error::Config {
                field: "dampReqRVal".to_string(),
                message: format!(
                    "quorum size {} exceeds fan-out width {}",
                    self.damp_req_r_val, self.damp_req_n_val
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.damped_max_percentage) {
            return Err(Error::Config {
                field: "dampedMaxPercentage".to_string(),
                message: format!("{} is outside [0, 1]", self.damped_max_percentage),
            });
        }
        if self.damp_scoring_suppress_limit < 0.0 {
            return Err(Error::Config {
                field: "dampScoringSuppressLimit".to_string(),
                message: "suppress limit must be non-negative".to_string(),
            });
        }
        Ok(())
    }
}
