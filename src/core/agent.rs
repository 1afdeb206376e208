use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use autometrics::autometrics;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::sleep_until;
use tokio::time::timeout;
use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::ElectionParams;
use super::timer::instant_after;
use super::ElectionTimer;
use super::NodeState;
use super::Role;
use crate::metrics::HELD_FENCING_TOKEN;
use crate::metrics::IS_LEADER;
use crate::metrics::LEADERSHIP_TRANSITIONS;
use crate::metrics::STORE_CALL_FAILURES;
use crate::metrics::STORE_CALL_LATENCY_MS;
use crate::metrics::STORE_UNAVAILABLE;
use crate::utils::async_task::backoff_delay;
use crate::utils::async_task::with_timeout;
use crate::AcquireOutcome;
use crate::Clock;
use crate::ElectionError;
use crate::Error;
use crate::HeartbeatStore;
use crate::Lease;
use crate::LeaseStore;
use crate::LeadershipEvent;
use crate::Publisher;
use crate::RenewOutcome;
use crate::Result;
use crate::RetryPolicies;
use crate::SystemClock;
use crate::API_SLO;

const COMMAND_QUEUE_CAPACITY: usize = 64;

#[derive(Debug)]
pub enum AgentCommand {
    /// A leadership event for this agent's cluster arrived
    Observe(LeadershipEvent),
    /// Give up leadership voluntarily
    StepDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DemoteReason {
    /// Another holder owns the lease now
    Deposed,
    /// The lease ran out, either in the store or by the local deadline
    Lapsed,
    /// Released on request or at shutdown
    Released,
}

/// Cloneable access to a running [`ElectionAgent`].
#[derive(Debug, Clone)]
pub struct AgentHandle {
    cluster_id: String,
    holder_id: String,
    status_rx: watch::Receiver<NodeState>,
    command_tx: mpsc::Sender<AgentCommand>,
}

impl AgentHandle {
    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    /// Latest published snapshot of the agent's state
    pub fn state(&self) -> NodeState {
        self.status_rx.borrow().clone()
    }

    pub fn is_leader(&self) -> bool {
        self.status_rx.borrow().is_leader()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<NodeState> {
        self.status_rx.clone()
    }

    pub async fn step_down(&self) -> Result<()> {
        self.command_tx
            .send(AgentCommand::StepDown)
            .await
            .map_err(|_| ElectionError::AgentStopped(self.cluster_id.clone()).into())
    }

    /// Hands a received event to the agent without waiting. Events are
    /// hints, so one dropped on a full queue is only logged.
    pub fn observe(
        &self,
        event: LeadershipEvent,
    ) {
        if let Err(e) = self.command_tx.try_send(AgentCommand::Observe(event)) {
            debug!("[{}] dropping leadership hint: {}", self.holder_id, e);
        }
    }
}

/// Per-node election state machine for one cluster.
///
/// Every store call for the cluster is issued from [`ElectionAgent::run`],
/// one at a time, so a renewal and an acquisition can never race each
/// other inside one process.
pub struct ElectionAgent {
    cluster_id: String,
    holder_id: String,
    store: Arc<dyn LeaseStore>,
    heartbeats: Option<Arc<dyn HeartbeatStore>>,
    publisher: Publisher,
    params: Arc<ArcSwap<ElectionParams>>,
    clock: Arc<dyn Clock>,
    store_call_timeout: Duration,
    unavailable_alert_windows: u32,
    retry: RetryPolicies,

    state: NodeState,
    timer: ElectionTimer,
    /// Local view of when the held lease ends: call start + ttl
    lease_deadline: Option<Instant>,
    acquire_failures: usize,
    renew_failures: usize,
    outage_since: Option<Instant>,
    last_beat: Option<Instant>,
    /// No competing before this instant after a voluntary step-down
    hold_off_until: Option<Instant>,

    status_tx: watch::Sender<NodeState>,
    command_rx: mpsc::Receiver<AgentCommand>,
    shutdown_signal: watch::Receiver<()>,
}

impl std::fmt::Debug for ElectionAgent {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ElectionAgent")
            .field("cluster_id", &self.cluster_id)
            .field("holder_id", &self.holder_id)
            .field("state", &self.state)
            .finish()
    }
}

impl ElectionAgent {
    pub fn new(
        cluster_id: &str,
        holder_id: &str,
        store: Arc<dyn LeaseStore>,
        publisher: Publisher,
        params: Arc<ArcSwap<ElectionParams>>,
        shutdown_signal: watch::Receiver<()>,
    ) -> (Self, AgentHandle) {
        let state = NodeState::new(cluster_id, holder_id);
        let (status_tx, status_rx) = watch::channel(state.clone());
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);

        let agent = Self {
            cluster_id: cluster_id.to_string(),
            holder_id: holder_id.to_string(),
            store,
            heartbeats: None,
            publisher,
            params,
            clock: Arc::new(SystemClock),
            store_call_timeout: Duration::from_millis(1000),
            unavailable_alert_windows: 3,
            retry: RetryPolicies::default(),
            state,
            timer: ElectionTimer::new(),
            lease_deadline: None,
            acquire_failures: 0,
            renew_failures: 0,
            outage_since: None,
            last_beat: None,
            hold_off_until: None,
            status_tx,
            command_rx,
            shutdown_signal,
        };
        let handle = AgentHandle {
            cluster_id: cluster_id.to_string(),
            holder_id: holder_id.to_string(),
            status_rx,
            command_tx,
        };
        (agent, handle)
    }

    pub fn with_heartbeats(
        mut self,
        heartbeats: Arc<dyn HeartbeatStore>,
    ) -> Self {
        self.heartbeats = Some(heartbeats);
        self
    }

    pub fn with_clock(
        mut self,
        clock: Arc<dyn Clock>,
    ) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_store_call_timeout(
        mut self,
        store_call_timeout: Duration,
    ) -> Self {
        self.store_call_timeout = store_call_timeout;
        self
    }

    pub fn with_unavailable_alert_windows(
        mut self,
        windows: u32,
    ) -> Self {
        self.unavailable_alert_windows = windows.max(1);
        self
    }

    pub fn with_retry(
        mut self,
        retry: RetryPolicies,
    ) -> Self {
        self.retry = retry;
        self
    }

    pub async fn run(mut self) -> Result<()> {
        info!("[{}:{}] election agent started", self.cluster_id, self.holder_id);

        loop {
            let tick = sleep_until(self.timer.next_deadline());
            tokio::select! {
                biased;
                // P0: shutdown received
                _ = self.shutdown_signal.changed() => {
                    warn!("[{}:{}] shutdown signal received.", self.cluster_id, self.holder_id);
                    self.shutdown().await;
                    return Ok(());
                }
                // P1: commands
                Some(command) = self.command_rx.recv() => {
                    debug!("[{}] receive command: {:?}", self.holder_id, command);
                    self.handle_command(command).await;
                }
                // P2: acquire or renew
                _ = tick => {
                    trace!("[{}] tick", self.holder_id);
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&mut self) {
        // one snapshot per cycle; a concurrent swap applies to the next one
        let params = self.params.load_full();
        match self.state.role {
            Role::Leader => self.renew_cycle(&params).await,
            Role::Follower | Role::Candidate => self.acquire_cycle(&params).await,
        }

        // after the lease call, and never past the next cycle's deadline
        self.beat_if_due(&params).await;
    }

    async fn acquire_cycle(
        &mut self,
        params: &ElectionParams,
    ) {
        self.set_role(Role::Candidate);
        let started = Instant::now();
        let budget = self.store_call_timeout.min(params.renewal_interval());

        match self.call_try_acquire(params.lease_ttl, budget).await {
            Ok(AcquireOutcome::Acquired(lease)) => {
                self.store_succeeded();
                self.become_leader(lease, started, params);
            }
            Ok(AcquireOutcome::NotAcquired(current)) => {
                self.store_succeeded();
                self.acquire_failures = 0;
                debug!(
                    "[{}] lease held by {} (token {})",
                    self.holder_id, current.holder_id, current.fencing_token
                );
                self.state
                    .observe_leader(Some(current.holder_id.clone()), current.fencing_token);
                self.set_role(Role::Follower);
                self.schedule_after_observed(&current, params);
            }
            Err(e) => {
                self.store_failed("try_acquire", &e, params);
                self.acquire_failures += 1;
                self.set_role(Role::Follower);
                let delay = backoff_delay(&self.retry.acquire, self.acquire_failures);
                self.timer.reset_with_jitter(delay, params);
            }
        }
        self.publish_status();
    }

    async fn renew_cycle(
        &mut self,
        params: &ElectionParams,
    ) {
        let (deadline, token) = match (self.lease_deadline, self.state.held_fencing_token) {
            (Some(deadline), Some(token)) => (deadline, token),
            _ => {
                error!("[{}] leader without a held lease, demoting", self.holder_id);
                self.lose_leadership(DemoteReason::Lapsed, params);
                return;
            }
        };

        let now = Instant::now();
        if now >= deadline {
            warn!("[{}] lease deadline passed before renewal", self.holder_id);
            self.lose_leadership(DemoteReason::Lapsed, params);
            return;
        }

        let budget = self.store_call_timeout.min(deadline - now);
        match self.call_renew(token, params.lease_ttl, budget).await {
            Ok(RenewOutcome::Renewed(lease)) => {
                self.store_succeeded();
                self.renew_failures = 0;
                self.lease_deadline = Some(instant_after(now, params.lease_ttl));
                self.state.last_renewal_at = Some(self.clock.now_ms());
                trace!(
                    "[{}] renewed token {} until {}",
                    self.holder_id,
                    lease.fencing_token,
                    lease.expires_at_ms
                );
                self.timer.reset_after(params.renewal_interval());
                self.publish_status();
            }
            Ok(RenewOutcome::Rejected(Some(current))) => {
                self.store_succeeded();
                info!(
                    "[{}] deposed: {} now holds {} with token {}",
                    self.holder_id, current.holder_id, self.cluster_id, current.fencing_token
                );
                self.lose_leadership(DemoteReason::Deposed, params);
                self.state
                    .observe_leader(Some(current.holder_id.clone()), current.fencing_token);
                self.schedule_after_observed(&current, params);
                self.publish_status();
            }
            Ok(RenewOutcome::Rejected(None)) => {
                self.store_succeeded();
                info!("[{}] lease on {} lapsed before renewal landed", self.holder_id, self.cluster_id);
                self.lose_leadership(DemoteReason::Lapsed, params);
            }
            Err(e) => {
                self.store_failed("renew", &e, params);
                self.renew_failures += 1;
                let delay = backoff_delay(&self.retry.renew, self.renew_failures);
                if instant_after(Instant::now(), delay) >= deadline {
                    warn!(
                        "[{}] no renewal can complete before the lease deadline, relinquishing",
                        self.holder_id
                    );
                    self.lose_leadership(DemoteReason::Lapsed, params);
                } else {
                    debug!("[{}] retrying renewal in {:?}", self.holder_id, delay);
                    self.timer.reset_after(delay);
                }
            }
        }
    }

    async fn handle_command(
        &mut self,
        command: AgentCommand,
    ) {
        match command {
            AgentCommand::Observe(event) => self.handle_event(event),
            AgentCommand::StepDown => self.step_down().await,
        }
    }

    fn handle_event(
        &mut self,
        event: LeadershipEvent,
    ) {
        if event.cluster_id != self.cluster_id {
            return;
        }
        if event.new_holder_id.as_deref() == Some(self.holder_id.as_str()) {
            return;
        }
        if !self
            .state
            .observe_leader(event.new_holder_id.clone(), event.fencing_token)
        {
            return;
        }

        match self.state.role {
            Role::Leader => {
                if self.state.held_fencing_token < Some(event.fencing_token) {
                    // somebody holds a newer token: confirm with the store now
                    warn!(
                        "[{}] observed token {} above held {:?}",
                        self.holder_id, event.fencing_token, self.state.held_fencing_token
                    );
                    self.timer.advance_to(Instant::now());
                }
            }
            Role::Follower | Role::Candidate => {
                if event.is_vacant() {
                    let params = self.params.load();
                    let mut at = instant_after(Instant::now(), params.jitter());
                    if let Some(hold_off) = self.hold_off_until {
                        at = at.max(hold_off);
                    }
                    debug!(
                        "[{}] vacancy observed, competing in {:?}",
                        self.holder_id,
                        at.saturating_duration_since(Instant::now())
                    );
                    self.timer.advance_to(at);
                }
            }
        }
        self.publish_status();
    }

    async fn step_down(&mut self) {
        if self.state.role != Role::Leader {
            debug!("[{}] step down ignored: not leader", self.holder_id);
            return;
        }
        let params = self.params.load_full();
        info!("[{}] stepping down from {}", self.holder_id, self.cluster_id);

        self.release_held().await;
        if let Some(event) = self.demote(DemoteReason::Released) {
            self.publisher.publish(event);
        }

        let hold_off = params.renewal_interval();
        self.hold_off_until = Some(instant_after(Instant::now(), hold_off));
        self.timer.reset_with_jitter(hold_off, &params);
        self.publish_status();
    }

    async fn shutdown(&mut self) {
        if self.state.role == Role::Leader {
            self.release_held().await;
            if let Some(event) = self.demote(DemoteReason::Released) {
                // the runtime may stop right after us: publish inline, bounded
                if let Err(e) = timeout(self.store_call_timeout, self.publisher.publish_with_retry(event)).await {
                    warn!("[{}] vacancy announcement timed out: {:?}", self.holder_id, e);
                }
            }
        } else {
            self.set_role(Role::Follower);
        }
        self.publish_status();
        info!("[{}:{}] election agent stopped", self.cluster_id, self.holder_id);
    }

    /// Best effort; an already expired or reassigned lease is fine.
    async fn release_held(&mut self) {
        let Some(token) = self.state.held_fencing_token else {
            return;
        };
        match self.call_release(token, self.store_call_timeout).await {
            Ok(()) => debug!("[{}] released token {}", self.holder_id, token),
            Err(e) => warn!("[{}] release of token {} failed: {:?}", self.holder_id, token, e),
        }
    }

    fn become_leader(
        &mut self,
        lease: Lease,
        started: Instant,
        params: &ElectionParams,
    ) {
        info!(
            "[{}] became leader of {} with fencing token {}",
            self.holder_id, self.cluster_id, lease.fencing_token
        );
        self.set_role(Role::Leader);
        self.state.held_fencing_token = Some(lease.fencing_token);
        self.state.last_renewal_at = Some(self.clock.now_ms());
        self.state
            .observe_leader(Some(self.holder_id.clone()), lease.fencing_token);
        self.lease_deadline = Some(instant_after(started, params.lease_ttl));
        self.acquire_failures = 0;
        self.renew_failures = 0;
        self.hold_off_until = None;
        self.timer.reset_after(params.renewal_interval());

        HELD_FENCING_TOKEN
            .with_label_values(&[&self.cluster_id, &self.holder_id])
            .set(lease.fencing_token as i64);
        self.publisher.publish(LeadershipEvent::acquired(
            &self.cluster_id,
            &self.holder_id,
            lease.fencing_token,
            self.clock.now_ms(),
        ));
    }

    /// Demotes, announces a vacancy when one was left, and schedules the next
    /// acquisition attempt.
    fn lose_leadership(
        &mut self,
        reason: DemoteReason,
        params: &ElectionParams,
    ) {
        if let Some(event) = self.demote(reason) {
            self.publisher.publish(event);
        }
        let delay = match reason {
            DemoteReason::Lapsed => backoff_delay(&self.retry.acquire, self.renew_failures.max(1)),
            _ => Duration::ZERO,
        };
        self.renew_failures = 0;
        self.timer.reset_with_jitter(delay, params);
        self.publish_status();
    }

    /// Drops the held token. Returns the vacancy event to announce, if any.
    fn demote(
        &mut self,
        reason: DemoteReason,
    ) -> Option<LeadershipEvent> {
        let token = self.state.held_fencing_token.take();
        self.lease_deadline = None;
        self.set_role(Role::Follower);
        HELD_FENCING_TOKEN
            .with_label_values(&[&self.cluster_id, &self.holder_id])
            .set(0);

        let token = token?;
        match reason {
            DemoteReason::Deposed => {
                info!("[{}] demoted: token {} superseded", self.holder_id, token);
                None
            }
            DemoteReason::Lapsed | DemoteReason::Released => {
                info!("[{}] demoted ({:?}), token {} no longer held", self.holder_id, reason, token);
                self.state.observe_leader(None, token);
                Some(LeadershipEvent::vacant(&self.cluster_id, token, self.clock.now_ms()))
            }
        }
    }

    /// Next attempt at the observed lease's expiry, polling at least once
    /// per renewal interval.
    fn schedule_after_observed(
        &mut self,
        current: &Lease,
        params: &ElectionParams,
    ) {
        let until_expiry = current.remaining(self.clock.now_ms());
        let mut delay = until_expiry.min(params.renewal_interval());
        if let Some(hold_off) = self.hold_off_until {
            delay = delay.max(hold_off.saturating_duration_since(Instant::now()));
        }
        self.timer.reset_with_jitter(delay, params);
    }

    async fn beat_if_due(
        &mut self,
        params: &ElectionParams,
    ) {
        let Some(heartbeats) = self.heartbeats.clone() else {
            return;
        };
        if self
            .last_beat
            .is_some_and(|at| at.elapsed() < params.renewal_interval())
        {
            return;
        }
        let budget = self.store_call_timeout.min(self.timer.remaining());
        if budget.is_zero() {
            trace!("[{}] heartbeat deferred: next cycle is due", self.holder_id);
            return;
        }
        self.last_beat = Some(Instant::now());

        let beat = heartbeats.beat(&self.cluster_id, &self.holder_id, params.lease_ttl);
        if let Err(e) = with_timeout(budget, beat).await {
            debug!("[{}] heartbeat failed: {:?}", self.holder_id, e);
        }
    }

    fn set_role(
        &mut self,
        role: Role,
    ) {
        let previous = self.state.role;
        if previous == role {
            return;
        }
        self.state.role = role;
        LEADERSHIP_TRANSITIONS
            .with_label_values(&[
                &self.cluster_id,
                &format!("{}_to_{}", previous.as_str(), role.as_str()),
            ])
            .inc();
        IS_LEADER
            .with_label_values(&[&self.cluster_id, &self.holder_id])
            .set(i64::from(role == Role::Leader));
    }

    fn store_succeeded(&mut self) {
        self.outage_since = None;
        if self.state.store_unavailable {
            info!("[{}] lease store reachable again", self.holder_id);
            self.state.store_unavailable = false;
            STORE_UNAVAILABLE
                .with_label_values(&[&self.cluster_id, &self.holder_id])
                .set(0);
        }
    }

    fn store_failed(
        &mut self,
        operation: &str,
        e: &Error,
        params: &ElectionParams,
    ) {
        STORE_CALL_FAILURES.with_label_values(&[operation]).inc();
        if e.is_transient() {
            warn!("[{}] {} failed: {}", self.holder_id, operation, e);
        } else {
            error!("[{}] {} failed: {:?}", self.holder_id, operation, e);
        }

        let since = *self.outage_since.get_or_insert_with(Instant::now);
        let alert_after = params
            .lease_ttl
            .checked_mul(self.unavailable_alert_windows)
            .unwrap_or(Duration::MAX);
        if !self.state.store_unavailable && since.elapsed() >= alert_after {
            error!(
                "[{}] lease store unreachable for {:?}; staying follower and retrying",
                self.holder_id,
                since.elapsed()
            );
            self.state.store_unavailable = true;
            STORE_UNAVAILABLE
                .with_label_values(&[&self.cluster_id, &self.holder_id])
                .set(1);
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.state.clone());
    }

    #[autometrics(objective = API_SLO)]
    async fn call_try_acquire(
        &self,
        ttl: Duration,
        budget: Duration,
    ) -> Result<AcquireOutcome> {
        let started = Instant::now();
        let result = with_timeout(budget, self.store.try_acquire(&self.cluster_id, &self.holder_id, ttl)).await;
        observe_latency("try_acquire", started);
        result
    }

    #[autometrics(objective = API_SLO)]
    async fn call_renew(
        &self,
        fencing_token: u64,
        ttl: Duration,
        budget: Duration,
    ) -> Result<RenewOutcome> {
        let started = Instant::now();
        let result = with_timeout(
            budget,
            self.store
                .renew(&self.cluster_id, &self.holder_id, fencing_token, ttl),
        )
        .await;
        observe_latency("renew", started);
        result
    }

    #[autometrics(objective = API_SLO)]
    async fn call_release(
        &self,
        fencing_token: u64,
        budget: Duration,
    ) -> Result<()> {
        let started = Instant::now();
        let result = with_timeout(
            budget,
            self.store
                .release(&self.cluster_id, &self.holder_id, fencing_token),
        )
        .await;
        observe_latency("release", started);
        result
    }
}

fn observe_latency(
    operation: &str,
    started: Instant,
) {
    STORE_CALL_LATENCY_MS
        .with_label_values(&[operation])
        .observe(started.elapsed().as_secs_f64() * 1000.0);
}
