use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;

use super::expiry_ms;
use super::AcquireOutcome;
use super::HeartbeatStore;
use super::Lease;
use super::LeaseRecord;
use super::LeaseStore;
use super::Member;
use super::RenewOutcome;
use crate::constants::heartbeat_key;
use crate::constants::heartbeat_prefix;
use crate::constants::lease_key;
use crate::fencing::TokenAllocator;
use crate::Clock;
use crate::Result;
use crate::SystemClock;

#[derive(Debug, Default)]
struct MemState {
    leases: HashMap<String, LeaseRecord>,
    fences: TokenAllocator,
    heartbeats: HashMap<String, u64>,
}

/// Shared in-memory lease store.
///
/// Clones share one keyspace, so every agent handed a clone races against
/// the same records. One mutex makes each operation a single atomic step,
/// standing in for the conditional-write primitive of a real shared store.
#[derive(Debug, Clone)]
pub struct MemLeaseStore {
    state: Arc<Mutex<MemState>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemLeaseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemLeaseStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemState::default())),
            clock,
        }
    }

    /// Drops the lease record regardless of holder, as if the store
    /// evicted it. Used to simulate forced reassignment.
    pub fn evict(
        &self,
        cluster_id: &str,
    ) {
        self.state.lock().leases.remove(&lease_key(cluster_id));
    }

    fn live_record<'a>(
        leases: &'a HashMap<String, LeaseRecord>,
        key: &str,
        now: u64,
    ) -> Option<&'a LeaseRecord> {
        leases.get(key).filter(|r| now < r.expires_at_ms)
    }
}

#[async_trait]
impl LeaseStore for MemLeaseStore {
    async fn try_acquire(
        &self,
        cluster_id: &str,
        holder_id: &str,
        ttl: Duration,
    ) -> Result<AcquireOutcome> {
        let key = lease_key(cluster_id);
        let now = self.clock.now_ms();
        let mut state = self.state.lock();

        if let Some(current) = Self::live_record(&state.leases, &key, now) {
            trace!("{} held by {} until {}", key, current.holder_id, current.expires_at_ms);
            return Ok(AcquireOutcome::NotAcquired(current.clone().into_lease(cluster_id)));
        }

        let fencing_token = state.fences.allocate(cluster_id)?;
        let record = LeaseRecord {
            holder_id: holder_id.to_string(),
            fencing_token,
            expires_at_ms: expiry_ms(now, ttl),
        };
        state.leases.insert(key, record.clone());
        debug!("{} acquired {} with token {}", holder_id, cluster_id, fencing_token);

        Ok(AcquireOutcome::Acquired(record.into_lease(cluster_id)))
    }

    async fn renew(
        &self,
        cluster_id: &str,
        holder_id: &str,
        fencing_token: u64,
        ttl: Duration,
    ) -> Result<RenewOutcome> {
        let key = lease_key(cluster_id);
        let now = self.clock.now_ms();
        let mut state = self.state.lock();

        match state.leases.get_mut(&key) {
            Some(record) if now < record.expires_at_ms && record.matches(holder_id, fencing_token) => {
                record.expires_at_ms = expiry_ms(now, ttl);
                Ok(RenewOutcome::Renewed(record.clone().into_lease(cluster_id)))
            }
            Some(record) if now < record.expires_at_ms => {
                Ok(RenewOutcome::Rejected(Some(record.clone().into_lease(cluster_id))))
            }
            _ => Ok(RenewOutcome::Rejected(None)),
        }
    }

    async fn release(
        &self,
        cluster_id: &str,
        holder_id: &str,
        fencing_token: u64,
    ) -> Result<()> {
        let key = lease_key(cluster_id);
        let mut state = self.state.lock();
        if state
            .leases
            .get(&key)
            .is_some_and(|r| r.matches(holder_id, fencing_token))
        {
            state.leases.remove(&key);
            debug!("{} released {} (token {})", holder_id, cluster_id, fencing_token);
        }
        Ok(())
    }

    async fn read(
        &self,
        cluster_id: &str,
    ) -> Result<Option<Lease>> {
        let now = self.clock.now_ms();
        let state = self.state.lock();
        Ok(Self::live_record(&state.leases, &lease_key(cluster_id), now)
            .cloned()
            .map(|r| r.into_lease(cluster_id)))
    }
}

#[async_trait]
impl HeartbeatStore for MemLeaseStore {
    async fn beat(
        &self,
        cluster_id: &str,
        holder_id: &str,
        ttl: Duration,
    ) -> Result<()> {
        let expires_at_ms = expiry_ms(self.clock.now_ms(), ttl);
        self.state
            .lock()
            .heartbeats
            .insert(heartbeat_key(cluster_id, holder_id), expires_at_ms);
        Ok(())
    }

    async fn live_members(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<Member>> {
        let now = self.clock.now_ms();
        let prefix = heartbeat_prefix(cluster_id);
        let mut state = self.state.lock();
        state.heartbeats.retain(|_, expires_at| now < *expires_at);

        let mut members: Vec<Member> = state
            .heartbeats
            .iter()
            .filter_map(|(key, expires_at_ms)| {
                key.strip_prefix(&prefix).map(|holder_id| Member {
                    holder_id: holder_id.to_string(),
                    expires_at_ms: *expires_at_ms,
                })
            })
            .collect();
        members.sort_by(|a, b| a.holder_id.cmp(&b.holder_id));
        Ok(members)
    }
}
