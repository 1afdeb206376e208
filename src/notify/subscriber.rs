use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::DedupWindow;
use super::LeadershipEvent;
use super::NotificationChannel;
use crate::constants::leadership_topic;
use crate::metrics::EVENTS_DELIVERED;
use crate::metrics::EVENTS_DUPLICATED;
use crate::Result;

/// Receives leadership events for one cluster at a time.
#[derive(Clone)]
pub struct Subscriber {
    channel: Arc<dyn NotificationChannel>,
    dedup_window: usize,
}

impl Subscriber {
    pub fn new(
        channel: Arc<dyn NotificationChannel>,
        dedup_window: usize,
    ) -> Self {
        Self {
            channel,
            dedup_window,
        }
    }

    /// Invokes `handler` once per distinct event of `cluster_id`.
    ///
    /// Delivery and handling run on separate tasks joined by an unbounded
    /// queue: a slow handler delays only itself, never the drain of the
    /// channel or any other subscription.
    pub fn subscribe<F>(
        &self,
        cluster_id: &str,
        mut handler: F,
    ) -> Result<Subscription>
    where
        F: FnMut(LeadershipEvent) + Send + 'static,
    {
        let mut stream = self.channel.subscribe(&leadership_topic(cluster_id))?;
        let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<LeadershipEvent>();

        let cluster = cluster_id.to_string();
        let window = self.dedup_window;
        let delivery = tokio::spawn(async move {
            let mut dedup = DedupWindow::new(window);
            while let Some(payload) = stream.next().await {
                let event = match LeadershipEvent::decode(&payload) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("dropping undecodable leadership event: {:?}", e);
                        continue;
                    }
                };
                if event.cluster_id != cluster {
                    trace!("ignoring event for {}", event.cluster_id);
                    continue;
                }
                if !dedup.insert(event.dedup_key()) {
                    debug!("duplicate delivery of {:?}", event.dedup_key());
                    EVENTS_DUPLICATED.with_label_values(&[&cluster]).inc();
                    continue;
                }
                if queue_tx.send(event).is_err() {
                    break;
                }
            }
            debug!("delivery for {} stopped", cluster);
        });

        let cluster = cluster_id.to_string();
        let handling = tokio::spawn(async move {
            while let Some(event) = queue_rx.recv().await {
                EVENTS_DELIVERED.with_label_values(&[&cluster]).inc();
                handler(event);
            }
        });

        Ok(Subscription {
            cluster_id: cluster_id.to_string(),
            delivery,
            handling,
        })
    }

    /// Subscription whose handler forwards into the returned receiver.
    pub fn subscribe_queue(
        &self,
        cluster_id: &str,
    ) -> Result<(Subscription, mpsc::UnboundedReceiver<LeadershipEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(cluster_id, move |event| {
            let _ = tx.send(event);
        })?;
        Ok((subscription, rx))
    }
}

/// Live subscription; dropping it stops delivery.
#[derive(Debug)]
pub struct Subscription {
    cluster_id: String,
    delivery: JoinHandle<()>,
    handling: JoinHandle<()>,
}

impl Subscription {
    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn cancel(&self) {
        self.delivery.abort();
        self.handling.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
