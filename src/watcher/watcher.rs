use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::ConfigSource;
use crate::metrics::CONFIG_RELOADS;
use crate::ElectionParams;
use crate::Error;
use crate::Result;

pub const LEASE_TTL_KEY: &str = "leaseTTL";
pub const RENEWAL_INTERVAL_FRACTION_KEY: &str = "renewalIntervalFraction";
pub const JITTER_MIN_MS_KEY: &str = "jitterMinMs";
pub const JITTER_MAX_MS_KEY: &str = "jitterMaxMs";

/// Builds a parameter set from source values. `leaseTTL` and the jitter
/// bounds are milliseconds. Keys match case-insensitively; absent keys keep
/// their `baseline` value.
pub fn parse_params(
    values: &HashMap<String, String>,
    baseline: &ElectionParams,
) -> Result<ElectionParams> {
    let values: HashMap<String, &str> = values
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim()))
        .collect();

    fn field<T: FromStr>(
        values: &HashMap<String, &str>,
        key: &str,
    ) -> Result<Option<T>> {
        match values.get(&key.to_ascii_lowercase()) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| Error::InvalidConfig(format!("{} has malformed value {:?}", key, raw))),
        }
    }

    let mut params = baseline.clone();
    if let Some(ms) = field::<u64>(&values, LEASE_TTL_KEY)? {
        params.lease_ttl = Duration::from_millis(ms);
    }
    if let Some(fraction) = field::<f64>(&values, RENEWAL_INTERVAL_FRACTION_KEY)? {
        params.renewal_interval_fraction = fraction;
    }
    if let Some(ms) = field::<u64>(&values, JITTER_MIN_MS_KEY)? {
        params.jitter_min = Duration::from_millis(ms);
    }
    if let Some(ms) = field::<u64>(&values, JITTER_MAX_MS_KEY)? {
        params.jitter_max = Duration::from_millis(ms);
    }
    Ok(params)
}

/// Applies externally pushed election parameters.
///
/// A valid, changed parameter set replaces the shared one in a single
/// atomic swap; agents pick it up at their next timer cycle. Invalid input
/// is rejected with a warning and the previous set stays in force.
pub struct ConfigWatcher {
    source: Arc<dyn ConfigSource>,
    params: Arc<ArcSwap<ElectionParams>>,
    baseline: ElectionParams,
    poll_interval: Duration,
}

impl ConfigWatcher {
    /// Absent keys fall back to the parameters in force at construction.
    pub fn new(
        source: Arc<dyn ConfigSource>,
        params: Arc<ArcSwap<ElectionParams>>,
        poll_interval: Duration,
    ) -> Self {
        let baseline = params.load().as_ref().clone();
        Self {
            source,
            params,
            baseline,
            poll_interval,
        }
    }

    pub fn params(&self) -> Arc<ElectionParams> {
        self.params.load_full()
    }

    /// Fetches once. `Ok(true)` when a new parameter set was swapped in.
    pub async fn poll_once(&self) -> Result<bool> {
        let values = self.source.fetch().await?;
        let candidate = parse_params(&values, &self.baseline)?;
        candidate.validate()?;

        if self.params.load().as_ref() == &candidate {
            return Ok(false);
        }
        info!("applying election parameters: {:?}", candidate);
        self.params.store(Arc::new(candidate));
        Ok(true)
    }

    pub async fn run(
        self,
        mut shutdown_signal: watch::Receiver<()>,
    ) -> Result<()> {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_signal.changed() => {
                    debug!("config watcher stopped");
                    return Ok(());
                }
                _ = self.source.changed() => debug!("config source pushed a change"),
                _ = interval.tick() => {}
            }
            self.reload().await;
        }
    }

    async fn reload(&self) {
        let result = match self.poll_once().await {
            Ok(true) => "applied",
            Ok(false) => "unchanged",
            Err(Error::InvalidConfig(reason)) => {
                warn!("rejecting election parameters, keeping previous: {}", reason);
                "rejected"
            }
            Err(e) => {
                warn!("config source unavailable: {:?}", e);
                "source_error"
            }
        };
        CONFIG_RELOADS.with_label_values(&[result]).inc();
    }
}
