use std::sync::Arc;
use std::time::Duration;

use delect::BroadcastChannel;
use delect::LeaseStore;
use delect::Role;
use tokio::time::Instant;
use tracing::info;
use tracing_test::traced_test;

use crate::common::scenario_params;
use crate::common::wait_until;
use crate::common::Fleet;
use crate::common::CLUSTER;

/// Three machines, the leader crashes: a survivor takes over with the next
/// token before the old lease could have been renewed twice, and the other
/// survivor stays a follower.
#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_crashed_leader_is_replaced_with_next_token() {
    let mut fleet = Fleet::start(&["A", "B", "C"], Arc::new(BroadcastChannel::default()), scenario_params());

    let first = fleet
        .wait_for_single_leader(Duration::from_secs(2))
        .await
        .expect("a leader is elected");
    let lease = fleet.store.read(CLUSTER).await.unwrap().unwrap();
    assert_eq!(lease.fencing_token, 1);
    assert_eq!(lease.holder_id, fleet.machines[first].holder_id());

    // let it renew a few times
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(fleet.leaders(), vec![first]);
    for machine in fleet.machines.iter_mut() {
        machine.drain_events();
    }

    info!("crashing {}", fleet.machines[first].holder_id());
    fleet.machines[first].kill();
    let crashed_at = Instant::now();

    let store = fleet.store.clone();
    let mut next_token = 0;
    let replaced = wait_until(Duration::from_secs(6), || {
        let leaders = fleet.leaders();
        if leaders.len() == 1 && leaders[0] != first {
            next_token = fleet.machines[leaders[0]].handle.state().held_fencing_token.unwrap_or(0);
            return true;
        }
        false
    })
    .await;
    assert!(replaced, "no survivor took over within 6s");
    assert!(crashed_at.elapsed() <= Duration::from_secs(6));
    assert_eq!(next_token, 2);

    let successor = fleet.leaders()[0];
    let lease = store.read(CLUSTER).await.unwrap().unwrap();
    assert_eq!(lease.holder_id, fleet.machines[successor].holder_id());
    assert_eq!(lease.fencing_token, 2);

    for (i, machine) in fleet.machines.iter().enumerate() {
        if i != first && i != successor {
            assert_eq!(machine.handle.state().role, Role::Follower);
        }
    }

    // every machine that is still alive was told about token 2
    tokio::time::sleep(Duration::from_millis(100)).await;
    for (i, machine) in fleet.machines.iter_mut().enumerate() {
        if i == first {
            continue;
        }
        let events = machine.drain_events();
        assert!(
            events
                .iter()
                .any(|e| e.fencing_token == 2 && e.new_holder_id.as_deref() == Some(lease.holder_id.as_str())),
            "{} missed the takeover: {:?}",
            machine.holder_id(),
            events
        );
    }
}

/// Failover after a crash never takes longer than the lease TTL plus one
/// renewal interval plus the maximum jitter.
#[tokio::test(start_paused = true)]
async fn test_failover_time_is_bounded() {
    let params = scenario_params();
    let bound = params.lease_ttl + params.renewal_interval() + params.jitter_max;
    let fleet = Fleet::start(&["A", "B", "C"], Arc::new(BroadcastChannel::default()), params);

    let mut token = 1;
    let mut leader = fleet.wait_for_single_leader(Duration::from_secs(2)).await.unwrap();
    // crash leaders one after another until one machine remains
    for _ in 0..2 {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        fleet.machines[leader].kill();
        let crashed_at = Instant::now();

        let crashed = leader;
        assert!(
            wait_until(bound, || {
                let leaders = fleet.leaders();
                leaders.len() == 1 && leaders[0] != crashed
            })
            .await
        );
        assert!(crashed_at.elapsed() <= bound);

        leader = fleet.leaders()[0];
        token += 1;
        assert_eq!(
            fleet.machines[leader].handle.state().held_fencing_token,
            Some(token)
        );
    }
}
