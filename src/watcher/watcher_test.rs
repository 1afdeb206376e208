use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;

use super::*;
use crate::test_utils::wait_until;
use crate::ElectionParams;
use crate::Error;
use crate::StoreError;

fn shared(params: ElectionParams) -> Arc<ArcSwap<ElectionParams>> {
    Arc::new(ArcSwap::from_pointee(params))
}

fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_parse_params_falls_back_for_absent_keys() {
    let baseline = ElectionParams::default();
    let parsed = parse_params(&values(&[("leaseTTL", "5000")]), &baseline).unwrap();
    assert_eq!(parsed.lease_ttl, Duration::from_millis(5000));
    assert_eq!(parsed.renewal_interval_fraction, baseline.renewal_interval_fraction);
    assert_eq!(parsed.jitter_min, baseline.jitter_min);
    assert_eq!(parsed.jitter_max, baseline.jitter_max);
}

#[test]
fn test_parse_params_is_case_insensitive() {
    let parsed = parse_params(
        &values(&[
            ("leasettl", "8000"),
            ("RENEWALINTERVALFRACTION", "0.5"),
            ("jitterminms", "20"),
            ("jitterMaxMs", " 40 "),
        ]),
        &ElectionParams::default(),
    )
    .unwrap();
    assert_eq!(parsed.lease_ttl, Duration::from_secs(8));
    assert_eq!(parsed.renewal_interval_fraction, 0.5);
    assert_eq!(parsed.jitter_min, Duration::from_millis(20));
    assert_eq!(parsed.jitter_max, Duration::from_millis(40));
}

#[test]
fn test_parse_params_rejects_malformed_values() {
    let result = parse_params(&values(&[("leaseTTL", "ten seconds")]), &ElectionParams::default());
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[tokio::test]
async fn test_poll_once_swaps_valid_changes_only() {
    let source = MemoryConfigSource::new();
    let params = shared(ElectionParams::default());
    let watcher = ConfigWatcher::new(Arc::new(source.clone()), params.clone(), Duration::from_secs(60));

    // nothing set: baseline equals current
    assert!(!watcher.poll_once().await.unwrap());

    source.set(LEASE_TTL_KEY, 6000);
    assert!(watcher.poll_once().await.unwrap());
    assert_eq!(params.load().lease_ttl, Duration::from_secs(6));
    assert!(!watcher.poll_once().await.unwrap());

    // inverted jitter is rejected, previous parameters stay in force
    source.set(JITTER_MIN_MS_KEY, 500);
    source.set(JITTER_MAX_MS_KEY, 100);
    assert!(matches!(watcher.poll_once().await, Err(Error::InvalidConfig(_))));
    assert_eq!(params.load().lease_ttl, Duration::from_secs(6));
    assert_eq!(params.load().jitter_min, Duration::from_millis(100));

    // removing a key reverts it to the startup value
    source.remove(JITTER_MIN_MS_KEY);
    source.remove(JITTER_MAX_MS_KEY);
    source.remove(LEASE_TTL_KEY);
    assert!(watcher.poll_once().await.unwrap());
    assert_eq!(*params.load_full(), ElectionParams::default());
}

#[tokio::test]
async fn test_oversized_lease_ttl_is_rejected() {
    let source = MemoryConfigSource::new();
    let params = shared(ElectionParams::default());
    let watcher = ConfigWatcher::new(Arc::new(source.clone()), params.clone(), Duration::from_secs(60));

    source.set(LEASE_TTL_KEY, u64::MAX);
    assert!(matches!(watcher.poll_once().await, Err(Error::InvalidConfig(_))));
    assert_eq!(*params.load_full(), ElectionParams::default());

    source.set(LEASE_TTL_KEY, crate::MAX_LEASE_TTL.as_millis() as u64 + 1);
    assert!(matches!(watcher.poll_once().await, Err(Error::InvalidConfig(_))));
    assert_eq!(*params.load_full(), ElectionParams::default());
}

#[tokio::test]
async fn test_source_failure_keeps_params() {
    let mut source = MockConfigSource::new();
    source
        .expect_fetch()
        .returning(|| Err(StoreError::Unavailable("parameter store down".into()).into()));
    let params = shared(ElectionParams::default());
    let watcher = ConfigWatcher::new(Arc::new(source), params.clone(), Duration::from_secs(60));

    assert!(watcher.poll_once().await.is_err());
    assert_eq!(*params.load_full(), ElectionParams::default());
}

#[tokio::test(start_paused = true)]
async fn test_run_applies_pushed_change_without_waiting_for_poll() {
    let source = MemoryConfigSource::new();
    let params = shared(ElectionParams::default());
    let watcher = ConfigWatcher::new(Arc::new(source.clone()), params.clone(), Duration::from_secs(3600));
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let task = tokio::spawn(watcher.run(shutdown_rx));

    tokio::task::yield_now().await;
    source.set(RENEWAL_INTERVAL_FRACTION_KEY, "0.25");
    assert!(
        wait_until(Duration::from_secs(1), || params.load().renewal_interval_fraction == 0.25).await
    );

    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_file_source_is_reread_on_poll() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "leaseTTL = 4000\njitterMaxMs = 250").unwrap();
    file.flush().unwrap();

    let source = FileConfigSource::new(file.path());
    let params = shared(ElectionParams::default());
    let watcher = ConfigWatcher::new(Arc::new(source), params.clone(), Duration::from_secs(60));

    assert!(watcher.poll_once().await.unwrap());
    assert_eq!(params.load().lease_ttl, Duration::from_secs(4));
    assert_eq!(params.load().jitter_max, Duration::from_millis(250));

    std::fs::write(file.path(), "leaseTTL = 7000\n").unwrap();
    assert!(watcher.poll_once().await.unwrap());
    assert_eq!(params.load().lease_ttl, Duration::from_secs(7));
    assert_eq!(params.load().jitter_max, ElectionParams::default().jitter_max);
}

#[tokio::test]
async fn test_missing_file_is_a_source_error() {
    let source = FileConfigSource::new("/nonexistent/election.toml");
    let params = shared(ElectionParams::default());
    let watcher = ConfigWatcher::new(Arc::new(source), params, Duration::from_secs(60));
    assert!(matches!(watcher.poll_once().await, Err(Error::Config(_))));
}
