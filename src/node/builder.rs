//! A builder for assembling a [`Node`] from [`Settings`].
//!
//! Every collaborator has a production default derived from the settings
//! (sled or in-memory lease store, in-process broadcast channel, file based
//! parameter source, wall clock) and may be overridden before `build()`.
//!
//! ## Example
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let node = NodeBuilder::new(settings, shutdown_rx)
//!     .store(Arc::new(my_store))   // Optional override
//!     .build()?;
//! node.run().await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures::FutureExt;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;

use super::Node;
use crate::metrics;
use crate::ApiContext;
use crate::BroadcastChannel;
use crate::Clock;
use crate::ConfigSource;
use crate::ConfigWatcher;
use crate::ElectionAgent;
use crate::FileConfigSource;
use crate::HeartbeatStore;
use crate::LeaderCache;
use crate::LeaderContext;
use crate::LeaderTask;
use crate::LeaderQuery;
use crate::LeaseStore;
use crate::MemLeaseStore;
use crate::NotificationChannel;
use crate::Publisher;
use crate::Result;
use crate::Settings;
use crate::SledLeaseStore;
use crate::StoreBackend;
use crate::Subscriber;
use crate::SystemClock;
use crate::WorkOutcome;
use crate::generate_holder_id;

pub struct NodeBuilder {
    settings: Settings,
    store: Option<Arc<dyn LeaseStore>>,
    heartbeats: Option<Arc<dyn HeartbeatStore>>,
    channel: Option<Arc<dyn NotificationChannel>>,
    config_source: Option<Arc<dyn ConfigSource>>,
    clock: Option<Arc<dyn Clock>>,
    holder_ids: Option<Vec<String>>,
    leader_work: Option<LeaderTask>,
    shutdown_signal: watch::Receiver<()>,
}

impl NodeBuilder {
    /// # Arguments
    /// * `settings` - Validated node settings
    /// * `shutdown_signal` - Watch channel for graceful shutdown signaling
    pub fn new(
        settings: Settings,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            settings,
            store: None,
            heartbeats: None,
            channel: None,
            config_source: None,
            clock: None,
            holder_ids: None,
            leader_work: None,
            shutdown_signal,
        }
    }

    /// Sets a store used for both leases and heartbeats
    pub fn store<S>(
        mut self,
        store: Arc<S>,
    ) -> Self
    where
        S: LeaseStore + HeartbeatStore,
    {
        self.store = Some(store.clone() as Arc<dyn LeaseStore>);
        self.heartbeats = Some(store as Arc<dyn HeartbeatStore>);
        self
    }

    /// Sets a lease store without presence tracking
    pub fn lease_store(
        mut self,
        store: Arc<dyn LeaseStore>,
    ) -> Self {
        self.store = Some(store);
        self.heartbeats = None;
        self
    }

    pub fn channel(
        mut self,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Sets the source of hot-reloadable election parameters
    pub fn config_source(
        mut self,
        source: Arc<dyn ConfigSource>,
    ) -> Self {
        self.config_source = Some(source);
        self
    }

    pub fn clock(
        mut self,
        clock: Arc<dyn Clock>,
    ) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Fixes the holder ids of the local agents instead of generating them.
    /// One agent is created per id.
    pub fn holder_ids(
        mut self,
        holder_ids: Vec<String>,
    ) -> Self {
        self.holder_ids = Some(holder_ids);
        self
    }

    /// Work to run on every local agent while it leads. Started once per
    /// leadership term and cancelled when the term ends; returning
    /// [`WorkOutcome::Relinquish`] steps the agent down.
    pub fn leader_work<F, Fut>(
        mut self,
        work: F,
    ) -> Self
    where
        F: Fn(LeaderContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<WorkOutcome>> + Send + 'static,
    {
        let task: LeaderTask = Arc::new(move |ctx: LeaderContext| work(ctx).boxed());
        self.leader_work = Some(task);
        self
    }

    /// Assembles agents, subscriber, watcher and api surface.
    ///
    /// Nothing runs until [`Node::run`].
    pub fn build(self) -> Result<Node> {
        let settings = self.settings;
        settings.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let (store, heartbeats) = match (self.store, self.heartbeats) {
            (Some(store), heartbeats) => (store, heartbeats),
            (None, _) => default_store(&settings, clock.clone())?,
        };
        let channel = self
            .channel
            .unwrap_or_else(|| Arc::new(BroadcastChannel::new(settings.notification.channel_capacity)));

        let cluster_id = settings.cluster.cluster_id.clone();
        let params = Arc::new(ArcSwap::from_pointee(settings.election.params()));
        let holder_ids = self.holder_ids.unwrap_or_else(|| {
            (0..settings.cluster.local_agents)
                .map(|_| generate_holder_id(settings.cluster.holder_id_prefix.as_deref()))
                .collect()
        });

        let mut agents = Vec::with_capacity(holder_ids.len());
        let mut handles = Vec::with_capacity(holder_ids.len());
        for holder_id in &holder_ids {
            let publisher = Publisher::new(channel.clone(), settings.retry.publish);
            let (agent, handle) = ElectionAgent::new(
                &cluster_id,
                holder_id,
                store.clone(),
                publisher,
                params.clone(),
                self.shutdown_signal.clone(),
            );
            let mut agent = agent
                .with_clock(clock.clone())
                .with_store_call_timeout(settings.election.store_call_timeout())
                .with_unavailable_alert_windows(settings.election.unavailable_alert_windows)
                .with_retry(settings.retry.clone());
            if let Some(heartbeats) = &heartbeats {
                agent = agent.with_heartbeats(heartbeats.clone());
            }
            debug!("assembled agent {} for {}", holder_id, cluster_id);
            agents.push(agent);
            handles.push(handle);
        }

        let source: Option<Arc<dyn ConfigSource>> = match self.config_source {
            Some(source) => Some(source),
            None => settings
                .watcher
                .source_path
                .as_ref()
                .map(|path| Arc::new(FileConfigSource::new(path)) as Arc<dyn ConfigSource>),
        };
        let watcher = source.map(|source| {
            ConfigWatcher::new(
                source,
                params.clone(),
                Duration::from_millis(settings.watcher.poll_interval_ms),
            )
        });

        let cache = Arc::new(LeaderCache::new());
        let query = LeaderQuery::new(store.clone(), cache.clone(), settings.election.store_call_timeout());
        let api = if settings.api.enabled {
            if settings.api.prometheus_enabled {
                metrics::init_metrics();
            }
            let mut ctx = ApiContext::new(query.clone(), handles.clone())
                .with_prometheus(settings.api.prometheus_enabled);
            if let Some(heartbeats) = &heartbeats {
                ctx = ctx.with_heartbeats(heartbeats.clone());
            }
            Some(Arc::new(ctx))
        } else {
            None
        };

        let subscriber = Subscriber::new(channel, settings.notification.dedup_window as usize);
        info!(
            "node assembled: cluster {} with {} local agent(s) {:?}",
            cluster_id,
            handles.len(),
            holder_ids
        );

        Ok(Node {
            settings: Arc::new(settings),
            agents,
            handles,
            subscriber,
            cache,
            query,
            watcher,
            api,
            params,
            leader_work: self.leader_work,
            shutdown_signal: self.shutdown_signal,
        })
    }
}

fn default_store(
    settings: &Settings,
    clock: Arc<dyn Clock>,
) -> Result<(Arc<dyn LeaseStore>, Option<Arc<dyn HeartbeatStore>>)> {
    match settings.store.backend {
        StoreBackend::Memory => {
            let store = Arc::new(MemLeaseStore::with_clock(clock));
            Ok((store.clone() as Arc<dyn LeaseStore>, Some(store as Arc<dyn HeartbeatStore>)))
        }
        StoreBackend::Sled => {
            let store = Arc::new(SledLeaseStore::open(&settings.store.db_path)?);
            Ok((store.clone() as Arc<dyn LeaseStore>, Some(store as Arc<dyn HeartbeatStore>)))
        }
    }
}
