use std::sync::Arc;
use std::time::Duration;

use delect::LeaderCache;
use delect::LeadershipEvent;
use delect::NotificationChannel;
use delect::Publisher;
use delect::RetryPolicies;
use delect::Subscriber;
use tracing_test::traced_test;

use crate::common::scenario_params;
use crate::common::wait_until;
use crate::common::DuplicatingChannel;
use crate::common::Fleet;
use crate::common::CLUSTER;

/// With a channel that redelivers everything, each machine still handles
/// every transition exactly once.
#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_redelivered_events_are_handled_once() {
    let channel: Arc<dyn NotificationChannel> = Arc::new(DuplicatingChannel::default());
    let mut fleet = Fleet::start(&["A", "B", "C"], channel, scenario_params());
    let first = fleet.wait_for_single_leader(Duration::from_secs(2)).await.unwrap();

    fleet.machines[first].kill();
    assert!(
        wait_until(Duration::from_secs(6), || {
            let leaders = fleet.leaders();
            leaders.len() == 1 && leaders[0] != first
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    for (i, machine) in fleet.machines.iter_mut().enumerate() {
        if i == first {
            continue;
        }
        let events = machine.drain_events();
        for token in [1, 2] {
            let seen = events
                .iter()
                .filter(|e| e.fencing_token == token && !e.is_vacant())
                .count();
            assert_eq!(seen, 1, "{} saw token {} {} times", machine.holder_id(), token, seen);
        }
    }
}

/// Events delivered out of order never move the cache backwards.
#[tokio::test]
async fn test_cache_ignores_stale_deliveries() {
    let channel: Arc<dyn NotificationChannel> = Arc::new(DuplicatingChannel::default());
    let subscriber = Subscriber::new(channel.clone(), 64);
    let cache = Arc::new(LeaderCache::new());
    let c = cache.clone();
    let _subscription = subscriber
        .subscribe(CLUSTER, move |event| {
            c.apply(&event);
        })
        .unwrap();

    let publisher = Publisher::new(channel, RetryPolicies::default().publish);
    publisher
        .publish_with_retry(LeadershipEvent::acquired(CLUSTER, "B", 2, 20))
        .await
        .unwrap();
    publisher
        .publish_with_retry(LeadershipEvent::acquired(CLUSTER, "A", 1, 10))
        .await
        .unwrap();

    assert!(
        wait_until(Duration::from_secs(1), || {
            cache.get(CLUSTER).map(|k| k.fencing_token == 2).unwrap_or(false)
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    let known = cache.get(CLUSTER).unwrap();
    assert_eq!(known.holder_id.as_deref(), Some("B"));
    assert_eq!(known.fencing_token, 2);
}
