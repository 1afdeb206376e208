use std::sync::Arc;
use std::time::Duration;

use delect::BroadcastChannel;
use delect::LeaseStore;
use delect::MemLeaseStore;
use delect::NodeBuilder;
use delect::TokioClock;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing_test::traced_test;

use crate::common::scenario_params;
use crate::common::scenario_settings;
use crate::common::wait_until;
use crate::common::Fleet;
use crate::common::CLUSTER;

/// A voluntary step-down releases the lease and announces the vacancy, so a
/// follower takes over long before the old lease would have expired.
#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_step_down_hands_over_without_waiting_for_expiry() {
    let mut fleet = Fleet::start(&["A", "B"], Arc::new(BroadcastChannel::default()), scenario_params());
    let first = fleet.wait_for_single_leader(Duration::from_secs(2)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    for machine in fleet.machines.iter_mut() {
        machine.drain_events();
    }

    fleet.machines[first].handle.step_down().await.unwrap();
    let stepped_down_at = Instant::now();

    assert!(
        wait_until(Duration::from_secs(1), || {
            let leaders = fleet.leaders();
            leaders.len() == 1 && leaders[0] != first
        })
        .await,
        "follower did not react to the vacancy"
    );
    assert!(stepped_down_at.elapsed() < Duration::from_secs(1));

    let lease = fleet.store.read(CLUSTER).await.unwrap().unwrap();
    assert_eq!(lease.fencing_token, 2);

    let events = fleet.machines[1 - first].drain_events();
    assert!(events.iter().any(|e| e.is_vacant() && e.fencing_token == 1));
    assert!(events.iter().any(|e| !e.is_vacant() && e.fencing_token == 2));
}

/// Stopping a whole node releases its lease; a node sharing the store takes
/// over without waiting for the TTL.
#[tokio::test(start_paused = true)]
async fn test_node_shutdown_hands_over() {
    let clock = Arc::new(TokioClock::new());
    let store = Arc::new(MemLeaseStore::with_clock(clock.clone()));
    let channel = Arc::new(BroadcastChannel::default());

    let (first_tx, first_rx) = watch::channel(());
    let first = NodeBuilder::new(scenario_settings(), first_rx)
        .holder_ids(vec!["first".to_string()])
        .store(store.clone())
        .channel(channel.clone())
        .clock(clock.clone())
        .build()
        .unwrap();
    let first_handle = first.handles()[0].clone();
    let first_task = tokio::spawn(first.run());
    assert!(wait_until(Duration::from_secs(2), || first_handle.is_leader()).await);

    let (second_tx, second_rx) = watch::channel(());
    let second = NodeBuilder::new(scenario_settings(), second_rx)
        .holder_ids(vec!["second".to_string()])
        .store(store.clone())
        .channel(channel)
        .clock(clock)
        .build()
        .unwrap();
    let second_handle = second.handles()[0].clone();
    let second_task = tokio::spawn(second.run());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!second_handle.is_leader());

    first_tx.send(()).unwrap();
    first_task.await.unwrap().unwrap();
    let stopped_at = Instant::now();

    assert!(wait_until(Duration::from_secs(2), || second_handle.is_leader()).await);
    assert!(stopped_at.elapsed() < Duration::from_secs(1));
    let lease = store.read(CLUSTER).await.unwrap().unwrap();
    assert_eq!(lease.holder_id, "second");
    assert_eq!(lease.fencing_token, 2);

    second_tx.send(()).unwrap();
    second_task.await.unwrap().unwrap();
    assert!(store.read(CLUSTER).await.unwrap().is_none());
}
