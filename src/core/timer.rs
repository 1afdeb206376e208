use tokio::time::Duration;
use tokio::time::Instant;

use super::ElectionParams;
use super::MAX_LEASE_TTL;

/// Deadline of the agent's next acquire or renew cycle.
#[derive(Clone, Debug)]
pub struct ElectionTimer {
    pub next_deadline: Instant,
    pub tick_interval: Duration,
}

impl ElectionTimer {
    /// A timer that is already due, so a fresh agent competes immediately.
    pub fn new() -> Self {
        Self {
            next_deadline: Instant::now(),
            tick_interval: Duration::ZERO,
        }
    }

    pub fn reset_after(
        &mut self,
        delay: Duration,
    ) {
        let now = Instant::now();
        self.next_deadline = instant_after(now, delay);
        self.tick_interval = self.next_deadline - now;
    }

    /// `delay` plus a random jitter from `params`
    pub fn reset_with_jitter(
        &mut self,
        delay: Duration,
        params: &ElectionParams,
    ) {
        self.reset_after(delay.saturating_add(params.jitter()));
    }

    /// Moves the deadline earlier, never later.
    pub fn advance_to(
        &mut self,
        deadline: Instant,
    ) {
        if deadline < self.next_deadline {
            self.tick_interval = deadline.saturating_duration_since(Instant::now());
            self.next_deadline = deadline;
        }
    }

    pub fn remaining(&self) -> Duration {
        self.next_deadline.saturating_duration_since(Instant::now())
    }

    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn is_expired(&self) -> bool {
        self.next_deadline <= Instant::now()
    }
}

/// `from + delay`, with `delay` capped at [`MAX_LEASE_TTL`].
pub(crate) fn instant_after(
    from: Instant,
    delay: Duration,
) -> Instant {
    from.checked_add(delay.min(MAX_LEASE_TTL)).unwrap_or(from)
}

impl Default for ElectionTimer {
    fn default() -> Self {
        Self::new()
    }
}
