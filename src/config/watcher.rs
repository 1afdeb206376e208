use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatcherConfig {
    /// File polled for `leaseTTL`, `renewalIntervalFraction`, `jitterMinMs`
    /// and `jitterMaxMs`. Without it the node keeps its startup parameters.
    #[serde(default)]
    pub source_path: Option<PathBuf>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            source_path: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("poll_interval_ms must be greater than 0".into()));
        }
        Ok(())
    }
}

fn default_poll_interval_ms() -> u64 {
    5_000
}
