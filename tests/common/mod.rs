use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use delect::AgentHandle;
use delect::BroadcastChannel;
use delect::ElectionAgent;
use delect::ElectionParams;
use delect::LeadershipEvent;
use delect::MemLeaseStore;
use delect::NotificationChannel;
use delect::PayloadStream;
use delect::Publisher;
use delect::Result;
use delect::RetryPolicies;
use delect::Settings;
use delect::Subscriber;
use delect::Subscription;
use delect::TokioClock;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const CLUSTER: &str = "orders";

/// 5s leases, 100-300ms jitter
pub fn scenario_params() -> ElectionParams {
    ElectionParams {
        lease_ttl: Duration::from_secs(5),
        renewal_interval_fraction: 0.33,
        jitter_min: Duration::from_millis(100),
        jitter_max: Duration::from_millis(300),
    }
}

pub fn scenario_settings() -> Settings {
    let mut settings = Settings::default();
    settings.api.enabled = false;
    settings.cluster.cluster_id = CLUSTER.to_string();
    settings.election.lease_ttl_ms = 5_000;
    settings.election.jitter_min_ms = 100;
    settings.election.jitter_max_ms = 300;
    settings
}

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

/// Delivers every payload twice, like a channel that redelivers after a
/// missed acknowledgement.
#[derive(Debug, Default)]
pub struct DuplicatingChannel {
    inner: BroadcastChannel,
}

#[async_trait]
impl NotificationChannel for DuplicatingChannel {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> Result<()> {
        self.inner.publish(topic, payload.clone()).await?;
        self.inner.publish(topic, payload).await
    }

    fn subscribe(
        &self,
        topic: &str,
    ) -> Result<PayloadStream> {
        self.inner.subscribe(topic)
    }
}

/// One simulated machine: an agent, the subscription feeding it hints, and
/// a second subscription recording what the machine was told.
pub struct Machine {
    pub handle: AgentHandle,
    pub task: JoinHandle<()>,
    pub events: mpsc::UnboundedReceiver<LeadershipEvent>,
    _hints: Subscription,
    _recorder: Subscription,
}

impl Machine {
    pub fn holder_id(&self) -> &str {
        self.handle.holder_id()
    }

    /// Crash: the process vanishes without releasing its lease
    pub fn kill(&self) {
        self.task.abort();
    }

    pub fn drain_events(&mut self) -> Vec<LeadershipEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub struct Fleet {
    pub store: MemLeaseStore,
    pub channel: Arc<dyn NotificationChannel>,
    pub params: Arc<ArcSwap<ElectionParams>>,
    pub machines: Vec<Machine>,
    pub shutdown_tx: watch::Sender<()>,
}

impl Fleet {
    pub fn start(
        names: &[&str],
        channel: Arc<dyn NotificationChannel>,
        params: ElectionParams,
    ) -> Self {
        let clock = Arc::new(TokioClock::new());
        let store = MemLeaseStore::with_clock(clock.clone());
        let params = Arc::new(ArcSwap::from_pointee(params));
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let subscriber = Subscriber::new(channel.clone(), 1024);

        let machines = names
            .iter()
            .map(|name| {
                let publisher = Publisher::new(channel.clone(), RetryPolicies::default().publish);
                let (agent, handle) = ElectionAgent::new(
                    CLUSTER,
                    name,
                    Arc::new(store.clone()),
                    publisher,
                    params.clone(),
                    shutdown_rx.clone(),
                );
                let agent = agent.with_clock(clock.clone());

                let hinted = handle.clone();
                let hints = subscriber
                    .subscribe(CLUSTER, move |event| hinted.observe(event))
                    .unwrap();
                let (recorder, events) = subscriber.subscribe_queue(CLUSTER).unwrap();
                let task = tokio::spawn(async move {
                    let _ = agent.run().await;
                });

                Machine {
                    handle,
                    task,
                    events,
                    _hints: hints,
                    _recorder: recorder,
                }
            })
            .collect();

        Self {
            store,
            channel,
            params,
            machines,
            shutdown_tx,
        }
    }

    /// Indices of machines that are alive and report Leader
    pub fn leaders(&self) -> Vec<usize> {
        self.machines
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.task.is_finished() && m.handle.is_leader())
            .map(|(i, _)| i)
            .collect()
    }

    pub async fn wait_for_single_leader(
        &self,
        within: Duration,
    ) -> Option<usize> {
        if wait_until(within, || self.leaders().len() == 1).await {
            self.leaders().first().copied()
        } else {
            None
        }
    }
}
