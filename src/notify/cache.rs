use dashmap::DashMap;
use tracing::debug;

use super::LeadershipEvent;
use crate::KnownLeader;
use crate::Lease;

/// Node-local, advisory "who leads" cache fed by notifications and reads.
///
/// Never consult it for exclusivity decisions.
#[derive(Debug, Default)]
pub struct LeaderCache {
    leaders: DashMap<String, KnownLeader>,
}

impl LeaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `event` unless the cache already holds a newer observation.
    /// Out-of-order deliveries of older tokens are ignored.
    pub fn apply(
        &self,
        event: &LeadershipEvent,
    ) -> bool {
        self.observe(&event.cluster_id, event.new_holder_id.clone(), event.fencing_token)
    }

    /// Seeds the cache from a store read.
    pub fn record_lease(
        &self,
        lease: &Lease,
    ) -> bool {
        self.observe(&lease.cluster_id, Some(lease.holder_id.clone()), lease.fencing_token)
    }

    pub fn get(
        &self,
        cluster_id: &str,
    ) -> Option<KnownLeader> {
        self.leaders.get(cluster_id).map(|e| e.value().clone())
    }

    fn observe(
        &self,
        cluster_id: &str,
        holder_id: Option<String>,
        fencing_token: u64,
    ) -> bool {
        let vacant = holder_id.is_none();
        let mut entry = self
            .leaders
            .entry(cluster_id.to_string())
            .or_insert_with(|| KnownLeader {
                holder_id: holder_id.clone(),
                fencing_token,
            });
        let known = entry.value_mut();
        if known.fencing_token == fencing_token && known.holder_id == holder_id {
            // freshly inserted or identical
            return true;
        }
        if !known.superseded_by(fencing_token, vacant) {
            debug!(
                "ignoring stale observation for {}: token {} (cached {})",
                cluster_id, fencing_token, known.fencing_token
            );
            return false;
        }
        *known = KnownLeader {
            holder_id,
            fencing_token,
        };
        true
    }
}
