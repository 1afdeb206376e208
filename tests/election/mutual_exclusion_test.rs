use std::sync::Arc;
use std::time::Duration;

use delect::AcquireOutcome;
use delect::BroadcastChannel;
use delect::LeaseStore;
use delect::MemLeaseStore;
use futures::future::join_all;

use crate::common::scenario_params;
use crate::common::Fleet;
use crate::common::CLUSTER;

/// Five agents racing for one lease: at no sampled instant do two report
/// Leader, and whoever does matches the store record.
#[tokio::test(start_paused = true)]
async fn test_at_most_one_leader_among_five() {
    let fleet = Fleet::start(
        &["n1", "n2", "n3", "n4", "n5"],
        Arc::new(BroadcastChannel::default()),
        scenario_params(),
    );
    fleet.wait_for_single_leader(Duration::from_secs(2)).await.unwrap();

    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let leaders = fleet.leaders();
        assert!(leaders.len() <= 1, "split brain: {:?}", leaders);
        if let Some(&leader) = leaders.first() {
            let lease = fleet.store.read(CLUSTER).await.unwrap().unwrap();
            assert_eq!(lease.holder_id, fleet.machines[leader].holder_id());
            assert_eq!(
                fleet.machines[leader].handle.state().held_fencing_token,
                Some(lease.fencing_token)
            );
        }
    }
    // nobody lost the lease without reason, so it was never reissued
    assert_eq!(fleet.store.read(CLUSTER).await.unwrap().unwrap().fencing_token, 1);
}

#[tokio::test]
async fn test_concurrent_acquires_have_one_winner() {
    let store = MemLeaseStore::new();
    let attempts = (0..5).map(|i| {
        let store = store.clone();
        async move {
            store
                .try_acquire(CLUSTER, &format!("racer-{i}"), Duration::from_secs(10))
                .await
        }
    });

    let outcomes = join_all(attempts).await;
    let winners: Vec<_> = outcomes
        .into_iter()
        .filter_map(|o| match o.unwrap() {
            AcquireOutcome::Acquired(lease) => Some(lease),
            AcquireOutcome::NotAcquired(_) => None,
        })
        .collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].fencing_token, 1);
}
