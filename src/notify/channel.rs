use std::pin::Pin;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::Stream;
use futures::StreamExt;
#[cfg(test)]
use mockall::automock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;
use tracing::warn;

use crate::Result;

pub type PayloadStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// Topic based publish/subscribe transport.
///
/// Delivery is at-least-once with no ordering guarantee; payloads are opaque
/// to the channel.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotificationChannel: Send + Sync + 'static {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> Result<()>;

    /// Stream of every payload published to `topic` after this call
    fn subscribe(
        &self,
        topic: &str,
    ) -> Result<PayloadStream>;
}

/// In-process channel: one tokio broadcast sender per topic.
///
/// A subscriber that falls more than `capacity` messages behind loses the
/// oldest ones and is told how many it skipped.
#[derive(Debug)]
pub struct BroadcastChannel {
    topics: DashMap<String, broadcast::Sender<Vec<u8>>>,
    capacity: usize,
}

impl BroadcastChannel {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    fn sender(
        &self,
        topic: &str,
    ) -> broadcast::Sender<Vec<u8>> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for BroadcastChannel {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl NotificationChannel for BroadcastChannel {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> Result<()> {
        match self.sender(topic).send(payload) {
            Ok(receivers) => trace!("published to {} receivers on {}", receivers, topic),
            // nobody listening yet is not a failure
            Err(_) => trace!("no subscribers on {}", topic),
        }
        Ok(())
    }

    fn subscribe(
        &self,
        topic: &str,
    ) -> Result<PayloadStream> {
        let topic_name = topic.to_string();
        let stream = BroadcastStream::new(self.sender(topic).subscribe()).filter_map(move |item| {
            let topic_name = topic_name.clone();
            async move {
                match item {
                    Ok(payload) => Some(payload),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!("subscriber on {} lagged, skipped {} events", topic_name, skipped);
                        None
                    }
                }
            }
        });
        Ok(Box::pin(stream))
    }
}
