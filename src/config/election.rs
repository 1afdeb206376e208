use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::ElectionParams;
use crate::Result;

/// Election timing parameters.
///
/// `lease_ttl_ms`, `renewal_interval_fraction` and the jitter bounds are only
/// the *initial* values: the [`ConfigWatcher`](crate::ConfigWatcher) may swap
/// them at runtime. `store_call_timeout_ms` and `unavailable_alert_windows`
/// are fixed for the life of the process.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ElectionConfig {
    #[serde(default = "default_lease_ttl_ms")]
    pub lease_ttl_ms: u64,

    /// Renewal interval as a fraction of the lease TTL
    #[serde(default = "default_renewal_interval_fraction")]
    pub renewal_interval_fraction: f64,

    #[serde(default = "default_jitter_min_ms")]
    pub jitter_min_ms: u64,

    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,

    /// Upper bound for any single store call
    #[serde(default = "default_store_call_timeout_ms")]
    pub store_call_timeout_ms: u64,

    /// Number of lease TTL windows without a successful store call before
    /// the outage is reported as fatal unavailability
    #[serde(default = "default_unavailable_alert_windows")]
    pub unavailable_alert_windows: u32,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            lease_ttl_ms: default_lease_ttl_ms(),
            renewal_interval_fraction: default_renewal_interval_fraction(),
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
            store_call_timeout_ms: default_store_call_timeout_ms(),
            unavailable_alert_windows: default_unavailable_alert_windows(),
        }
    }
}

impl ElectionConfig {
    pub fn validate(&self) -> Result<()> {
        let params = self.params();
        params.validate()?;

        if self.store_call_timeout_ms == 0 {
            return Err(crate::Error::InvalidConfig(
                "store_call_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.store_call_timeout() >= params.renewal_interval() {
            return Err(crate::Error::InvalidConfig(format!(
                "store_call_timeout_ms {} must be smaller than the renewal interval {:?}",
                self.store_call_timeout_ms,
                params.renewal_interval()
            )));
        }

        if self.unavailable_alert_windows == 0 {
            return Err(crate::Error::InvalidConfig(
                "unavailable_alert_windows must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Initial hot-reloadable parameter set
    pub fn params(&self) -> ElectionParams {
        ElectionParams {
            lease_ttl: Duration::from_millis(self.lease_ttl_ms),
            renewal_interval_fraction: self.renewal_interval_fraction,
            jitter_min: Duration::from_millis(self.jitter_min_ms),
            jitter_max: Duration::from_millis(self.jitter_max_ms),
        }
    }

    pub fn store_call_timeout(&self) -> Duration {
        Duration::from_millis(self.store_call_timeout_ms)
    }
}

fn default_lease_ttl_ms() -> u64 {
    10_000
}
fn default_renewal_interval_fraction() -> f64 {
    0.33
}
fn default_jitter_min_ms() -> u64 {
    100
}
fn default_jitter_max_ms() -> u64 {
    300
}
fn default_store_call_timeout_ms() -> u64 {
    1_000
}
fn default_unavailable_alert_windows() -> u32 {
    3
}
