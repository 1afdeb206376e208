//! Leadership notifications.
//!
//! Agents publish a [`LeadershipEvent`] on every transition they observe;
//! any node may subscribe per cluster. Delivery is at-least-once and
//! unordered, so subscribers de-duplicate by `(cluster_id, fencing_token)`
//! and treat events as hints to re-validate against the lease store.

mod cache;
mod channel;
mod dedup;
mod event;
mod publisher;
mod subscriber;

pub use cache::*;
pub use channel::*;
pub(crate) use dedup::*;
pub use event::*;
pub use publisher::*;
pub use subscriber::*;

#[cfg(test)]
mod cache_test;
