use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::utils::async_task::jitter;
use crate::Error;
use crate::Result;

/// Longest lease a holder may be granted. Keeps every expiry and alert
/// window computed from the ttl far inside `u64` milliseconds.
pub const MAX_LEASE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Hot-reloadable election timing.
///
/// Agents load one snapshot per timer cycle; a swap only affects cycles that
/// start after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionParams {
    pub lease_ttl: Duration,
    /// Renewal interval as a fraction of `lease_ttl`, in (0, 1)
    pub renewal_interval_fraction: f64,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

impl Default for ElectionParams {
    fn default() -> Self {
        Self {
            lease_ttl: Duration::from_millis(10_000),
            renewal_interval_fraction: 0.33,
            jitter_min: Duration::from_millis(100),
            jitter_max: Duration::from_millis(300),
        }
    }
}

impl ElectionParams {
    pub fn validate(&self) -> Result<()> {
        if self.lease_ttl.is_zero() {
            return Err(Error::InvalidConfig("lease ttl must be greater than 0".into()));
        }

        if self.lease_ttl > MAX_LEASE_TTL {
            return Err(Error::InvalidConfig(format!(
                "lease ttl {:?} exceeds the maximum of {:?}",
                self.lease_ttl, MAX_LEASE_TTL
            )));
        }

        if !(self.renewal_interval_fraction > 0.0 && self.renewal_interval_fraction < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "renewal_interval_fraction {} must be within (0, 1)",
                self.renewal_interval_fraction
            )));
        }

        if self.jitter_min > self.jitter_max {
            return Err(Error::InvalidConfig(format!(
                "jitter_min {:?} must not exceed jitter_max {:?}",
                self.jitter_min, self.jitter_max
            )));
        }

        if self.jitter_max >= self.lease_ttl {
            return Err(Error::InvalidConfig(format!(
                "jitter_max {:?} must be smaller than lease ttl {:?}",
                self.jitter_max, self.lease_ttl
            )));
        }

        if self.renewal_interval().is_zero() {
            return Err(Error::InvalidConfig(format!(
                "renewal interval rounds to zero for lease ttl {:?}",
                self.lease_ttl
            )));
        }
        Ok(())
    }

    /// How long a leader waits between successful renewals
    pub fn renewal_interval(&self) -> Duration {
        let ms = (self.lease_ttl.as_millis() as f64 * self.renewal_interval_fraction) as u64;
        Duration::from_millis(ms)
    }

    /// Random delay within the jitter bounds
    pub fn jitter(&self) -> Duration {
        jitter(self.jitter_min, self.jitter_max)
    }
}
