use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::utils::async_task::with_timeout;
use crate::LeaderCache;
use crate::LeaseStore;
use crate::Result;

/// Answer to `current_leader`. `holder_id == None` means vacant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderView {
    pub cluster_id: String,
    pub holder_id: Option<String>,
    pub fencing_token: Option<u64>,
    /// Store-side expiry of the lease, when known
    pub expires_at_ms: Option<u64>,
    /// The store could not be read; answered from notifications seen locally
    pub from_cache: bool,
}

impl LeaderView {
    pub fn is_vacant(&self) -> bool {
        self.holder_id.is_none()
    }
}

/// Read-only "who leads" lookup backed by a store read plus the local
/// notification cache.
#[derive(Clone)]
pub struct LeaderQuery {
    store: Arc<dyn LeaseStore>,
    cache: Arc<LeaderCache>,
    call_timeout: Duration,
}

impl std::fmt::Debug for LeaderQuery {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LeaderQuery")
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl LeaderQuery {
    pub fn new(
        store: Arc<dyn LeaseStore>,
        cache: Arc<LeaderCache>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            call_timeout,
        }
    }

    pub fn cache(&self) -> &Arc<LeaderCache> {
        &self.cache
    }

    /// Current holder of `cluster_id`'s lease, or vacant.
    ///
    /// Falls back to the notification cache when the store cannot be read;
    /// fails only if neither source knows anything about the cluster.
    pub async fn current_leader(
        &self,
        cluster_id: &str,
    ) -> Result<LeaderView> {
        match with_timeout(self.call_timeout, self.store.read(cluster_id)).await {
            Ok(Some(lease)) => {
                self.cache.record_lease(&lease);
                Ok(LeaderView {
                    cluster_id: cluster_id.to_string(),
                    holder_id: Some(lease.holder_id),
                    fencing_token: Some(lease.fencing_token),
                    expires_at_ms: Some(lease.expires_at_ms),
                    from_cache: false,
                })
            }
            Ok(None) => Ok(LeaderView {
                cluster_id: cluster_id.to_string(),
                holder_id: None,
                fencing_token: None,
                expires_at_ms: None,
                from_cache: false,
            }),
            Err(e) => {
                warn!("lease read for {} failed, answering from cache: {:?}", cluster_id, e);
                let known = self.cache.get(cluster_id).ok_or(e)?;
                debug!("cached leader for {}: {:?}", cluster_id, known);
                Ok(LeaderView {
                    cluster_id: cluster_id.to_string(),
                    holder_id: known.holder_id,
                    fencing_token: Some(known.fencing_token),
                    expires_at_ms: None,
                    from_cache: true,
                })
            }
        }
    }
}
