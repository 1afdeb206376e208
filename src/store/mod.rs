//! Lease store adapters.
//!
//! A lease store is a shared key/value store offering atomic
//! "set-if-absent-or-expired", "compare-and-renew" and "compare-and-delete"
//! with per-key expiry. Exclusivity is enforced by the store's own atomicity;
//! adapters only translate calls onto the backend's conditional-write
//! primitive and never add in-process locking that spans machines.
//!
//! Key schema: `lease:{cluster_id}` -> `{holder_id, fencing_token, expires_at}`.

mod mem_lease_store;
mod sled_lease_store;

pub use mem_lease_store::*;
pub use sled_lease_store::*;


use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Exclusive, time-bounded ownership record for one cluster's leader role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub cluster_id: String,
    pub holder_id: String,
    pub fencing_token: u64,
    /// Milliseconds since the Unix epoch, store clock
    pub expires_at_ms: u64,
}

impl Lease {
    pub fn is_live(
        &self,
        now_ms: u64,
    ) -> bool {
        now_ms < self.expires_at_ms
    }

    /// Time left until the store considers this lease expired
    pub fn remaining(
        &self,
        now_ms: u64,
    ) -> Duration {
        Duration::from_millis(self.expires_at_ms.saturating_sub(now_ms))
    }
}

/// Persisted value of `lease:{cluster_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LeaseRecord {
    pub(crate) holder_id: String,
    pub(crate) fencing_token: u64,
    pub(crate) expires_at_ms: u64,
}

impl LeaseRecord {
    pub(crate) fn into_lease(
        self,
        cluster_id: &str,
    ) -> Lease {
        Lease {
            cluster_id: cluster_id.to_string(),
            holder_id: self.holder_id,
            fencing_token: self.fencing_token,
            expires_at_ms: self.expires_at_ms,
        }
    }

    pub(crate) fn matches(
        &self,
        holder_id: &str,
        fencing_token: u64,
    ) -> bool {
        self.holder_id == holder_id && self.fencing_token == fencing_token
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The caller now holds a freshly issued lease
    Acquired(Lease),
    /// Another live lease exists; carries the current holder's record
    NotAcquired(Lease),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewOutcome {
    /// Expiry extended, fencing token unchanged
    Renewed(Lease),
    /// The caller no longer holds the lease. `Some` when it was reassigned,
    /// `None` when it lapsed and nobody has taken it yet.
    Rejected(Option<Lease>),
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait LeaseStore: Send + Sync + 'static {
    /// Succeeds only if no live lease exists for `cluster_id`, issuing a
    /// fencing token strictly greater than any previously issued for it.
    async fn try_acquire(
        &self,
        cluster_id: &str,
        holder_id: &str,
        ttl: Duration,
    ) -> Result<AcquireOutcome>;

    /// Extends expiry only if both `holder_id` and `fencing_token` match
    /// the stored record.
    async fn renew(
        &self,
        cluster_id: &str,
        holder_id: &str,
        fencing_token: u64,
        ttl: Duration,
    ) -> Result<RenewOutcome>;

    /// Deletes the record only if it still matches. Idempotent; a missing
    /// or reassigned record is not an error.
    async fn release(
        &self,
        cluster_id: &str,
        holder_id: &str,
        fencing_token: u64,
    ) -> Result<()>;

    /// Non-authoritative snapshot of the live lease, for bootstrapping and
    /// diagnostics only.
    async fn read(
        &self,
        cluster_id: &str,
    ) -> Result<Option<Lease>>;
}

/// A node seen alive through its heartbeat key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub holder_id: String,
    pub expires_at_ms: u64,
}

/// Presence registry: `heartbeat:{cluster_id}:{holder_id}` with TTL
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HeartbeatStore: Send + Sync + 'static {
    async fn beat(
        &self,
        cluster_id: &str,
        holder_id: &str,
        ttl: Duration,
    ) -> Result<()>;

    async fn live_members(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<Member>>;
}

pub(crate) fn ttl_ms(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// Absolute expiry for a lease granted at `now_ms`, saturating at `u64::MAX`.
pub(crate) fn expiry_ms(
    now_ms: u64,
    ttl: Duration,
) -> u64 {
    now_ms.saturating_add(ttl_ms(ttl))
}
