use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::AgentHandle;
use crate::BackoffPolicy;
use crate::BroadcastChannel;
use crate::Clock;
use crate::ElectionAgent;
use crate::ElectionParams;
use crate::LeaseStore;
use crate::Publisher;
use crate::RetryPolicies;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

/// One second leases with short jitter, for paused-time tests.
pub fn fast_params() -> ElectionParams {
    ElectionParams {
        lease_ttl: Duration::from_millis(1000),
        renewal_interval_fraction: 0.3,
        jitter_min: Duration::from_millis(10),
        jitter_max: Duration::from_millis(50),
    }
}

pub fn fast_retry() -> RetryPolicies {
    RetryPolicies {
        acquire: BackoffPolicy {
            max_retries: 0,
            timeout_ms: 100,
            base_delay_ms: 20,
            max_delay_ms: 200,
        },
        renew: BackoffPolicy {
            max_retries: 0,
            timeout_ms: 100,
            base_delay_ms: 20,
            max_delay_ms: 100,
        },
        publish: BackoffPolicy {
            max_retries: 3,
            timeout_ms: 100,
            base_delay_ms: 10,
            max_delay_ms: 50,
        },
    }
}

/// Polls `predicate` every 10ms until it holds or `within` elapses.
pub async fn wait_until<F>(
    within: Duration,
    mut predicate: F,
) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + within;
    loop {
        if predicate() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Agents racing for one cluster through a shared store and channel.
pub struct TestCluster {
    pub handles: Vec<AgentHandle>,
    pub tasks: Vec<JoinHandle<()>>,
    pub channel: Arc<BroadcastChannel>,
    pub params: Arc<ArcSwap<ElectionParams>>,
    pub shutdown_tx: watch::Sender<()>,
}

impl TestCluster {
    pub fn spawn(
        cluster_id: &str,
        nodes: usize,
        store: Arc<dyn LeaseStore>,
        clock: Arc<dyn Clock>,
        params: ElectionParams,
    ) -> Self {
        let channel = Arc::new(BroadcastChannel::new(256));
        let params = Arc::new(ArcSwap::from_pointee(params));
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let retry = fast_retry();

        let mut handles = Vec::new();
        let mut tasks = Vec::new();
        for i in 0..nodes {
            let publisher = Publisher::new(channel.clone(), retry.publish);
            let (agent, handle) = ElectionAgent::new(
                cluster_id,
                &format!("node-{}", i),
                store.clone(),
                publisher,
                params.clone(),
                shutdown_rx.clone(),
            );
            let agent = agent
                .with_clock(clock.clone())
                .with_retry(retry.clone())
                .with_store_call_timeout(Duration::from_millis(100));
            handles.push(handle);
            tasks.push(tokio::spawn(async move {
                let _ = agent.run().await;
            }));
        }

        Self {
            handles,
            tasks,
            channel,
            params,
            shutdown_tx,
        }
    }

    pub fn leaders(&self) -> Vec<usize> {
        self.handles
            .iter()
            .enumerate()
            .filter(|(_, h)| h.is_leader())
            .map(|(i, _)| i)
            .collect()
    }

    /// Simulated crash: the agent stops without releasing anything.
    pub fn kill(
        &self,
        index: usize,
    ) {
        self.tasks[index].abort();
    }
}
