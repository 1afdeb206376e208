//! Per-node election state machine.
//!
//! An [`ElectionAgent`] owns all store calls for its cluster and drives the
//! Follower -> Candidate -> Leader transitions from a single task; other
//! components interact with it through an [`AgentHandle`].

mod agent;
mod params;
mod state;
mod timer;
mod work;

pub use agent::*;
pub use params::*;
pub use state::*;
pub use timer::*;
pub use work::*;
