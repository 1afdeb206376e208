use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;

use crate::AcquireOutcome;
use crate::Lease;
use crate::LeaseStore;
use crate::MemLeaseStore;
use crate::RenewOutcome;
use crate::Result;
use crate::StoreError;

/// Wraps a [`MemLeaseStore`] and fails every call while the fault is on.
#[derive(Debug, Clone, Default)]
pub struct FaultyLeaseStore {
    pub inner: MemLeaseStore,
    failing: std::sync::Arc<AtomicBool>,
}

impl FaultyLeaseStore {
    pub fn new(inner: MemLeaseStore) -> Self {
        Self {
            inner,
            failing: Default::default(),
        }
    }

    pub fn set_failing(
        &self,
        failing: bool,
    ) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected fault".to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl LeaseStore for FaultyLeaseStore {
    async fn try_acquire(
        &self,
        cluster_id: &str,
        holder_id: &str,
        ttl: Duration,
    ) -> Result<AcquireOutcome> {
        self.check()?;
        self.inner.try_acquire(cluster_id, holder_id, ttl).await
    }

    async fn renew(
        &self,
        cluster_id: &str,
        holder_id: &str,
        fencing_token: u64,
        ttl: Duration,
    ) -> Result<RenewOutcome> {
        self.check()?;
        self.inner.renew(cluster_id, holder_id, fencing_token, ttl).await
    }

    async fn release(
        &self,
        cluster_id: &str,
        holder_id: &str,
        fencing_token: u64,
    ) -> Result<()> {
        self.check()?;
        self.inner.release(cluster_id, holder_id, fencing_token).await
    }

    async fn read(
        &self,
        cluster_id: &str,
    ) -> Result<Option<Lease>> {
        self.check()?;
        self.inner.read(cluster_id).await
    }
}
