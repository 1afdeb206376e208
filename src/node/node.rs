//! A running election node.
//!
//! ## Key Responsibilities
//! - Runs one [`ElectionAgent`] per local holder id
//! - Feeds leadership notifications into the [`LeaderCache`] and back into
//!   the agents as scheduling hints
//! - Runs the configured leader work while a local agent leads
//! - Hot-reloads election parameters through the [`ConfigWatcher`]
//! - Serves the operational HTTP surface
//!
//! ## Example Usage
//! ```ignore
//! let node = NodeBuilder::new(settings, shutdown_rx).build()?;
//! node.run().await?;
//! ```

use std::sync::Arc;

use arc_swap::ArcSwap;
use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::start_server;
use crate::AgentHandle;
use crate::ApiContext;
use crate::ConfigWatcher;
use crate::ElectionAgent;
use crate::ElectionParams;
use crate::LeaderCache;
use crate::LeaderQuery;
use crate::LeaderTask;
use crate::LeaderWork;
use crate::Result;
use crate::Settings;
use crate::Subscriber;

pub struct Node {
    pub(super) settings: Arc<Settings>,
    pub(super) agents: Vec<ElectionAgent>,
    pub(super) handles: Vec<AgentHandle>,
    pub(super) subscriber: Subscriber,
    pub(super) cache: Arc<LeaderCache>,
    pub(super) query: LeaderQuery,
    pub(super) watcher: Option<ConfigWatcher>,
    pub(super) api: Option<Arc<ApiContext>>,
    pub(super) params: Arc<ArcSwap<ElectionParams>>,
    pub(super) leader_work: Option<LeaderTask>,
    pub(super) shutdown_signal: watch::Receiver<()>,
}

impl std::fmt::Debug for Node {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("cluster_id", &self.settings.cluster.cluster_id)
            .field("handles", &self.handles)
            .finish()
    }
}

impl Node {
    pub fn cluster_id(&self) -> &str {
        &self.settings.cluster.cluster_id
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.settings.clone()
    }

    /// Handles of the local agents, valid before and after `run()` starts
    pub fn handles(&self) -> &[AgentHandle] {
        &self.handles
    }

    /// Eventually consistent `current_leader` lookup
    pub fn leader_query(&self) -> LeaderQuery {
        self.query.clone()
    }

    pub fn leader_cache(&self) -> Arc<LeaderCache> {
        self.cache.clone()
    }

    /// Election parameters currently in force
    pub fn params(&self) -> Arc<ArcSwap<ElectionParams>> {
        self.params.clone()
    }

    /// Starts every component and waits for the shutdown signal.
    ///
    /// On shutdown agents holding a lease release it and announce the
    /// vacancy before this returns.
    pub async fn run(self) -> Result<()> {
        let Node {
            settings,
            agents,
            handles,
            subscriber,
            cache,
            watcher,
            api,
            leader_work,
            mut shutdown_signal,
            ..
        } = self;
        let cluster_id = settings.cluster.cluster_id.clone();

        // 1. Listen for leadership events before any agent can publish one
        let hinted = handles.clone();
        let _subscription = subscriber.subscribe(&cluster_id, move |event| {
            cache.apply(&event);
            for handle in &hinted {
                handle.observe(event.clone());
            }
        })?;

        // 2. Agents
        let agent_tasks: Vec<JoinHandle<Result<()>>> =
            agents.into_iter().map(|agent| tokio::spawn(agent.run())).collect();

        // 3. Leader-only work, one runner per local agent
        let work_tasks: Vec<JoinHandle<()>> = match &leader_work {
            Some(task) => handles
                .iter()
                .map(|handle| {
                    let task = task.clone();
                    LeaderWork::spawn(handle.clone(), shutdown_signal.clone(), move |ctx| task(ctx))
                })
                .collect(),
            None => Vec::new(),
        };

        // 4. Auxiliary services
        let mut services: Vec<JoinHandle<Result<()>>> = Vec::new();
        if let Some(watcher) = watcher {
            services.push(tokio::spawn(watcher.run(shutdown_signal.clone())));
        }
        if let Some(ctx) = api {
            services.push(tokio::spawn(start_server(
                settings.api.port,
                ctx,
                shutdown_signal.clone(),
            )));
        }

        info!("node for {} running with {} agent(s)", cluster_id, handles.len());
        if shutdown_signal.changed().await.is_err() {
            warn!("shutdown sender dropped, stopping node");
        }
        info!("node for {} shutting down", cluster_id);

        // Agents release their leases on the same signal; wait for them first
        for result in join_all(agent_tasks).await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("election agent stopped with error: {:?}", e),
                Err(e) => error!("election agent task failed: {:?}", e),
            }
        }
        for result in join_all(work_tasks).await {
            if let Err(e) = result {
                error!("leader work task failed: {:?}", e);
            }
        }
        for result in join_all(services).await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("service stopped with error: {:?}", e),
                Err(e) => error!("service task failed: {:?}", e),
            }
        }

        info!("node for {} stopped", cluster_id);
        Ok(())
    }
}
