//! Time sources shared by lease stores and election agents.
//!
//! Lease expiry is an absolute timestamp in milliseconds. Stores and agents
//! must read it from the same [`Clock`], otherwise a follower computes the
//! remaining lease time against a different reference than the store that
//! will judge the lease expired.

use std::fmt::Debug;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use tokio::time::Instant;

pub trait Clock: Send + Sync + Debug + 'static {
    /// Milliseconds since the Unix epoch according to this clock
    fn now_ms(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        get_now_as_millis()
    }
}

/// Clock driven by `tokio::time`, anchored to the wall clock at creation.
///
/// Under a paused tokio runtime (`#[tokio::test(start_paused = true)]`) this
/// clock advances together with `tokio::time::sleep`, which keeps multi-second
/// election scenarios deterministic and instantaneous in tests.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base_ms: u64,
    anchor: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            base_ms: get_now_as_millis(),
            anchor: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.base_ms + self.anchor.elapsed().as_millis() as u64
    }
}

/// return millisecond
pub(crate) fn get_now_as_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
