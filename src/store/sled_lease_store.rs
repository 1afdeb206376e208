use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sled::transaction::ConflictableTransactionError;
use sled::transaction::TransactionError;
use tracing::debug;
use tracing::warn;

use super::expiry_ms;
use super::AcquireOutcome;
use super::HeartbeatStore;
use super::Lease;
use super::LeaseRecord;
use super::LeaseStore;
use super::Member;
use super::RenewOutcome;
use crate::constants::fence_key;
use crate::constants::heartbeat_key;
use crate::constants::heartbeat_prefix;
use crate::constants::lease_key;
use crate::constants::LEASE_TREE;
use crate::fencing::next_fencing_token;
use crate::Clock;
use crate::Result;
use crate::StoreError;
use crate::SystemClock;

type TxResult<T> = std::result::Result<T, ConflictableTransactionError<StoreError>>;

/// Lease store backed by a sled tree.
///
/// Lease records and per-cluster fencing counters live side by side and are
/// updated inside one sled transaction, so a token is allocated and its
/// lease written atomically. Acquisitions are flushed before returning:
/// after a restart the fence counter never falls behind a token already
/// handed out.
#[derive(Clone)]
pub struct SledLeaseStore {
    db: sled::Db,
    tree: sled::Tree,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SledLeaseStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledLeaseStore")
            .field("tree_len", &self.tree.len())
            .finish()
    }
}

impl SledLeaseStore {
    pub fn open(db_path: impl AsRef<Path> + std::fmt::Debug) -> Result<Self> {
        debug!("open sled lease store at: {:?}", &db_path);
        let db = sled::Config::default()
            .path(db_path.as_ref())
            .cache_capacity(64 * 1024 * 1024)
            .open()
            .map_err(|e| {
                warn!("Try to open DB at this location: {:?} and failed: {:?}", db_path, e);
                StoreError::from(e)
            })?;
        Self::from_db(db, Arc::new(SystemClock))
    }

    pub fn from_db(
        db: sled::Db,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let tree = db.open_tree(LEASE_TREE)?;
        Ok(Self { db, tree, clock })
    }

    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    fn map_tx_error(e: TransactionError<StoreError>) -> StoreError {
        match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => StoreError::from(e),
        }
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> TxResult<T> {
    bincode::deserialize(bytes).map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))
}

fn encode<T: serde::Serialize>(value: &T) -> TxResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))
}

#[async_trait]
impl LeaseStore for SledLeaseStore {
    async fn try_acquire(
        &self,
        cluster_id: &str,
        holder_id: &str,
        ttl: Duration,
    ) -> Result<AcquireOutcome> {
        let lease_key = lease_key(cluster_id);
        let fence_key = fence_key(cluster_id);
        let now = self.clock.now_ms();

        let outcome = self
            .tree
            .transaction(|tx| -> TxResult<AcquireOutcome> {
                if let Some(bytes) = tx.get(lease_key.as_bytes())? {
                    let current: LeaseRecord = decode(&bytes)?;
                    if now < current.expires_at_ms {
                        return Ok(AcquireOutcome::NotAcquired(current.into_lease(cluster_id)));
                    }
                }

                let last_issued = match tx.get(fence_key.as_bytes())? {
                    Some(bytes) => Some(decode::<u64>(&bytes)?),
                    None => None,
                };
                let fencing_token = next_fencing_token(cluster_id, last_issued)
                    .map_err(ConflictableTransactionError::Abort)?;

                let record = LeaseRecord {
                    holder_id: holder_id.to_string(),
                    fencing_token,
                    expires_at_ms: expiry_ms(now, ttl),
                };
                tx.insert(fence_key.as_bytes(), encode(&fencing_token)?)?;
                tx.insert(lease_key.as_bytes(), encode(&record)?)?;
                Ok(AcquireOutcome::Acquired(record.into_lease(cluster_id)))
            })
            .map_err(Self::map_tx_error)?;

        if let AcquireOutcome::Acquired(lease) = &outcome {
            self.tree.flush_async().await.map_err(StoreError::from)?;
            debug!("{} acquired {} with token {}", holder_id, cluster_id, lease.fencing_token);
        }
        Ok(outcome)
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

        let outcome = self
            .tree
            .transaction(|tx| -> TxResult<RenewOutcome> {
                let current: LeaseRecord = match tx.get(key.as_bytes())? {
                    Some(bytes) => decode(&bytes)?,
                    None => return Ok(RenewOutcome::Rejected(None)),
                };
                if now >= current.expires_at_ms {
                    return Ok(RenewOutcome::Rejected(None));
                }
                if !current.matches(holder_id, fencing_token) {
                    return Ok(RenewOutcome::Rejected(Some(current.into_lease(cluster_id))));
                }

                let renewed = LeaseRecord {
                    expires_at_ms: expiry_ms(now, ttl),
                    ..current
                };
                tx.insert(key.as_bytes(), encode(&renewed)?)?;
                Ok(RenewOutcome::Renewed(renewed.into_lease(cluster_id)))
            })
            .map_err(Self::map_tx_error)?;
        Ok(outcome)
    }

    async fn release(
        &self,
        cluster_id: &str,
        holder_id: &str,
        fencing_token: u64,
    ) -> Result<()> {
        let key = lease_key(cluster_id);

        self.tree
            .transaction(|tx| -> TxResult<()> {
                if let Some(bytes) = tx.get(key.as_bytes())? {
                    let current: LeaseRecord = decode(&bytes)?;
                    if current.matches(holder_id, fencing_token) {
                        tx.remove(key.as_bytes())?;
                    }
                }
                Ok(())
            })
            .map_err(Self::map_tx_error)?;
        self.tree.flush_async().await.map_err(StoreError::from)?;
        Ok(())
    }

    async fn read(
        &self,
        cluster_id: &str,
    ) -> Result<Option<Lease>> {
        let now = self.clock.now_ms();
        match self.tree.get(lease_key(cluster_id))? {
            Some(bytes) => {
                let record: LeaseRecord = bincode::deserialize(&bytes).map_err(StoreError::from)?;
                Ok(Some(record)
                    .filter(|r| now < r.expires_at_ms)
                    .map(|r| r.into_lease(cluster_id)))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl HeartbeatStore for SledLeaseStore {
    async fn beat(
        &self,
        cluster_id: &str,
        holder_id: &str,
        ttl: Duration,
    ) -> Result<()> {
        let expires_at_ms = expiry_ms(self.clock.now_ms(), ttl);
        self.tree
            .insert(heartbeat_key(cluster_id, holder_id), expires_at_ms.to_be_bytes().to_vec())?;
        Ok(())
    }

    async fn live_members(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<Member>> {
        let now = self.clock.now_ms();
        let prefix = heartbeat_prefix(cluster_id);
        let mut members = Vec::new();

        for entry in self.tree.scan_prefix(prefix.as_bytes()) {
            let (key, value) = entry?;
            let expires_at_ms = match <[u8; 8]>::try_from(&value[..]) {
                Ok(raw) => u64::from_be_bytes(raw),
                Err(_) => {
                    warn!("malformed heartbeat value under {:?}", key);
                    continue;
                }
            };
            if now >= expires_at_ms {
                // best effort cleanup; a concurrent beat may already have replaced it
                let _ = self
                    .tree
                    .compare_and_swap(&key, Some(value), None as Option<&[u8]>);
                continue;
            }
            let holder_id = String::from_utf8_lossy(&key[prefix.len()..]).to_string();
            members.push(Member {
                holder_id,
                expires_at_ms,
            });
        }
        Ok(members)
    }
}
