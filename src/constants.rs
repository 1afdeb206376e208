// -
// Key schema

/// Lease record: `lease:{cluster_id}` -> `{holder_id, fencing_token, expires_at}`
pub(crate) const LEASE_KEY_PREFIX: &str = "lease:";

/// Per-cluster fencing counter: `fence:{cluster_id}` -> last issued token
pub(crate) const FENCE_KEY_PREFIX: &str = "fence:";

/// Presence record: `heartbeat:{cluster_id}:{holder_id}` -> expires_at
pub(crate) const HEARTBEAT_KEY_PREFIX: &str = "heartbeat:";

/// Notification topic per cluster: `leadership:{cluster_id}`
pub(crate) const LEADERSHIP_TOPIC_PREFIX: &str = "leadership:";

/// Sled tree holding leases, fences and heartbeats
pub(crate) const LEASE_TREE: &str = "_lease_tree";

pub(crate) fn lease_key(cluster_id: &str) -> String {
    format!("{LEASE_KEY_PREFIX}{cluster_id}")
}

pub(crate) fn fence_key(cluster_id: &str) -> String {
    format!("{FENCE_KEY_PREFIX}{cluster_id}")
}

pub(crate) fn heartbeat_prefix(cluster_id: &str) -> String {
    format!("{HEARTBEAT_KEY_PREFIX}{cluster_id}:")
}

pub(crate) fn heartbeat_key(
    cluster_id: &str,
    holder_id: &str,
) -> String {
    format!("{}{holder_id}", heartbeat_prefix(cluster_id))
}

pub(crate) fn leadership_topic(cluster_id: &str) -> String {
    format!("{LEADERSHIP_TOPIC_PREFIX}{cluster_id}")
}
