use std::thread::sleep;
use std::time::Duration;

use super::time::get_now_as_millis;
use crate::Clock;
use crate::SystemClock;
use crate::TokioClock;

#[test]
fn test_get_now_as_millis() {
    let t1 = get_now_as_millis();
    sleep(Duration::from_millis(10));
    let t2 = get_now_as_millis();

    // Ensure time is moving forward
    assert!(t2 > t1);
    assert!(t2 - t1 >= 10);
    assert!(t1 > 1_609_459_200_000); // Greater than 2021-01-01
}

#[test]
fn test_system_clock_tracks_wall_clock() {
    let clock = SystemClock;
    let wall = get_now_as_millis();
    let now = clock.now_ms();
    assert!(now >= wall);
    assert!(now - wall < 1_000);
}

#[tokio::test(start_paused = true)]
async fn test_tokio_clock_follows_paused_time() {
    let clock = TokioClock::new();
    let t1 = clock.now_ms();

    tokio::time::sleep(Duration::from_secs(5)).await;

    let t2 = clock.now_ms();
    assert_eq!(t2 - t1, 5_000);
}
