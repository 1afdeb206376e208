use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::LeadershipEvent;
use super::NotificationChannel;
use crate::constants::leadership_topic;
use crate::metrics::EVENTS_PUBLISHED;
use crate::utils::async_task::spawn_task;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::BackoffPolicy;
use crate::Result;

/// Announces leadership transitions.
#[derive(Clone)]
pub struct Publisher {
    channel: Arc<dyn NotificationChannel>,
    policy: BackoffPolicy,
}

impl std::fmt::Debug for Publisher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Publisher").field("policy", &self.policy).finish()
    }
}

impl Publisher {
    pub fn new(
        channel: Arc<dyn NotificationChannel>,
        policy: BackoffPolicy,
    ) -> Self {
        Self { channel, policy }
    }

    /// Fire-and-forget: retries in the background, never blocks the caller.
    pub fn publish(
        &self,
        event: LeadershipEvent,
    ) {
        let this = self.clone();
        spawn_task("publish_leadership_event", move || async move { this.publish_with_retry(event).await }, None);
    }

    /// Publishes with the configured timeout and backoff, reporting the
    /// final outcome.
    pub async fn publish_with_retry(
        &self,
        event: LeadershipEvent,
    ) -> Result<()> {
        let topic = leadership_topic(&event.cluster_id);
        let payload = event.encode()?;

        let result = task_with_timeout_and_exponential_backoff(
            || self.channel.publish(&topic, payload.clone()),
            self.policy,
        )
        .await;

        match &result {
            Ok(()) => {
                debug!("published {:?}", event);
                EVENTS_PUBLISHED
                    .with_label_values(&[&event.cluster_id, "ok"])
                    .inc();
            }
            Err(e) => {
                warn!("giving up publishing {:?}: {:?}", event, e);
                EVENTS_PUBLISHED
                    .with_label_values(&[&event.cluster_id, "failed"])
                    .inc();
            }
        }
        result
    }
}
