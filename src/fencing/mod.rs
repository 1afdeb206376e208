//! Fencing tokens.
//!
//! Every *new* acquisition of a cluster's lease is issued a token strictly
//! greater than any token issued before for that cluster; renewals keep the
//! token. Leaders tag externally visible, order-sensitive side effects with
//! their token, and consumers use a [`FenceGate`] to reject anything carrying
//! a token lower than the highest they have already seen. That is what stops
//! a partitioned, already superseded leader from corrupting state.


use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use tracing::debug;
use tracing::warn;

use crate::ElectionError;
use crate::Result;
use crate::StoreError;

/// Token following `last_issued`; the first acquisition of a cluster gets 1.
pub(crate) fn next_fencing_token(
    cluster_id: &str,
    last_issued: Option<u64>,
) -> std::result::Result<u64, StoreError> {
    match last_issued {
        None => Ok(1),
        Some(last) => last
            .checked_add(1)
            .ok_or_else(|| StoreError::FencingExhausted(cluster_id.to_string())),
    }
}

/// Per-cluster counters for stores that keep fencing state in memory.
///
/// Not synchronised on its own: callers hold it under the same lock that
/// guards the lease records so allocation and lease write are one step.
#[derive(Debug, Default)]
pub(crate) struct TokenAllocator {
    last_issued: HashMap<String, u64>,
}

impl TokenAllocator {
    pub(crate) fn allocate(
        &mut self,
        cluster_id: &str,
    ) -> std::result::Result<u64, StoreError> {
        let next = next_fencing_token(cluster_id, self.last_issued.get(cluster_id).copied())?;
        self.last_issued.insert(cluster_id.to_string(), next);
        Ok(next)
    }

    #[allow(dead_code)]
    pub(crate) fn last_issued(
        &self,
        cluster_id: &str,
    ) -> Option<u64> {
        self.last_issued.get(cluster_id).copied()
    }
}

/// Token-aware consumer guard.
///
/// Admits a token equal to or greater than the highest seen so far (the
/// current leader issues many actions under one token) and rejects anything
/// lower.
#[derive(Debug, Default)]
pub struct FenceGate {
    highest: AtomicU64,
}

impl FenceGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(
        &self,
        token: u64,
    ) -> Result<()> {
        let previous = self.highest.fetch_max(token, Ordering::AcqRel);
        if token < previous {
            warn!("rejecting stale fencing token {} (highest seen {})", token, previous);
            return Err(ElectionError::StaleFencingToken {
                presented: token,
                highest: previous,
            }
            .into());
        }
        if token > previous {
            debug!("fence advanced from {} to {}", previous, token);
        }
        Ok(())
    }

    pub fn highest(&self) -> u64 {
        self.highest.load(Ordering::Acquire)
    }
}

/// A value whose mutations must be tagged with a fencing token.
///
/// The gate check and the mutation happen under one lock, so a stale writer
/// can not interleave between a newer writer's admission and its update.
#[derive(Debug, Default)]
pub struct FencedResource<T> {
    inner: Mutex<(u64, T)>,
}

impl<T> FencedResource<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new((0, value)),
        }
    }

    /// Applies `f` if `token` is not older than any token applied before.
    pub fn apply<R>(
        &self,
        token: u64,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R> {
        let mut guard = self.inner.lock();
        let (highest, value) = &mut *guard;
        if token < *highest {
            return Err(ElectionError::StaleFencingToken {
                presented: token,
                highest: *highest,
            }
            .into());
        }
        *highest = token;
        Ok(f(value))
    }

    pub fn highest_token(&self) -> u64 {
        self.inner.lock().0
    }

    pub fn read<R>(
        &self,
        f: impl FnOnce(&T) -> R,
    ) -> R {
        f(&self.inner.lock().1)
    }
}
