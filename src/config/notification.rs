use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Per-topic buffer of the in-process broadcast channel. Subscribers
    /// lagging further than this lose the oldest events and must re-read.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// How many distinct events per cluster a subscriber remembers for
    /// duplicate suppression
    #[serde(default = "default_dedup_window")]
    pub dedup_window: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            dedup_window: default_dedup_window(),
        }
    }
}

impl NotificationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::InvalidConfig("channel_capacity must be greater than 0".into()));
        }
        if self.dedup_window == 0 {
            return Err(Error::InvalidConfig("dedup_window must be greater than 0".into()));
        }
        Ok(())
    }
}

fn default_channel_capacity() -> usize {
    1024
}
fn default_dedup_window() -> u64 {
    1024
}
