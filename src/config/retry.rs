use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Exponential backoff applied to lease store round-trips.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BackoffPolicy {
    /// Attempts before giving up; 0 keeps retrying until shutdown
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Per-attempt deadline in ms
    #[serde(default = "default_op_timeout_ms")]
    pub timeout_ms: u64,

    /// First backoff step in ms, doubled on every failure
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on a single backoff step in ms
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_op_timeout_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    fn validate(
        &self,
        name: &str,
    ) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(Error::InvalidConfig(format!("{name}.base_delay_ms must be > 0")));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::InvalidConfig(format!(
                "{name}.max_delay_ms {} must be >= base_delay_ms {}",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig(format!("{name}.timeout_ms must be > 0")));
        }
        Ok(())
    }
}

/// Divide strategies by operation.
///
/// Store calls made by the election agent are bounded by
/// `election.store_call_timeout_ms` rather than `timeout_ms`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryPolicies {
    /// Follower backoff after a transient acquisition failure.
    /// `max_retries` is ignored: followers never stop retrying.
    #[serde(default = "default_acquire_policy")]
    pub acquire: BackoffPolicy,

    /// Leader backoff after a transient renewal failure.
    /// Additionally bounded by the remaining lease time.
    #[serde(default = "default_renew_policy")]
    pub renew: BackoffPolicy,

    /// Fire-and-forget notification publishing
    #[serde(default = "default_publish_policy")]
    pub publish: BackoffPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            acquire: default_acquire_policy(),
            renew: default_renew_policy(),
            publish: default_publish_policy(),
        }
    }
}

impl RetryPolicies {
    pub fn validate(&self) -> Result<()> {
        self.acquire.validate("acquire")?;
        self.renew.validate("renew")?;
        self.publish.validate("publish")?;
        Ok(())
    }
}

fn default_acquire_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 0,
        timeout_ms: 1000,
        base_delay_ms: 200,
        max_delay_ms: 5000,
    }
}
fn default_renew_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 0,
        timeout_ms: 500,
        base_delay_ms: 50,
        max_delay_ms: 1000,
    }
}
fn default_publish_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 5,
        timeout_ms: 500,
        base_delay_ms: 100,
        max_delay_ms: 2000,
    }
}
fn default_max_retries() -> usize {
    3
}
fn default_op_timeout_ms() -> u64 {
    100
}
fn default_base_delay_ms() -> u64 {
    50
}
fn default_max_delay_ms() -> u64 {
    1000
}
