use serde::Deserialize;
use serde::Serialize;

use crate::NotificationError;
use crate::Result;

/// A leadership transition as announced on the notification channel.
///
/// Events are hints: subscribers re-validate with a store read before
/// making any correctness-critical decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadershipEvent {
    pub cluster_id: String,
    /// `None` announces a vacancy left by the holder of `fencing_token`
    pub new_holder_id: Option<String>,
    pub fencing_token: u64,
    /// Milliseconds since the Unix epoch, publisher clock
    pub timestamp_ms: u64,
}

/// Identity used to drop redelivered events
pub type DedupKey = (String, u64, bool);

impl LeadershipEvent {
    pub fn acquired(
        cluster_id: &str,
        holder_id: &str,
        fencing_token: u64,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            cluster_id: cluster_id.to_string(),
            new_holder_id: Some(holder_id.to_string()),
            fencing_token,
            timestamp_ms,
        }
    }

    pub fn vacant(
        cluster_id: &str,
        fencing_token: u64,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            cluster_id: cluster_id.to_string(),
            new_holder_id: None,
            fencing_token,
            timestamp_ms,
        }
    }

    pub fn is_vacant(&self) -> bool {
        self.new_holder_id.is_none()
    }

    pub fn dedup_key(&self) -> DedupKey {
        (self.cluster_id.clone(), self.fencing_token, self.is_vacant())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| NotificationError::Encode(e.to_string()).into())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| NotificationError::Decode(e.to_string()).into())
    }
}
