//! # d-elect
//!
//! Lease-based leader election for fleets of crash-prone workers.
//!
//! Every node runs an [`ElectionAgent`] per cluster it competes in. Agents
//! race for a time-bounded lease in a shared [`LeaseStore`]; the store's
//! conditional writes guarantee at most one live holder, and each new lease
//! carries a strictly increasing fencing token. Leaders renew well inside the
//! TTL and relinquish leadership on their own before the lease can expire
//! under them. Transitions are announced on a best-effort
//! [`NotificationChannel`] so other nodes react quickly, but correctness
//! never depends on those announcements.
//!
//! Downstream resources should reject actions tagged with an outdated
//! fencing token (see [`FencedResource`]): this is what turns "at most one
//! leader per lease" into "at most one leader's actions take effect".

mod api;
mod config;
mod constants;
mod core;
mod errors;
mod fencing;
pub mod metrics;
mod node;
mod notify;
mod store;
pub mod utils;
mod watcher;

pub use api::*;
pub use config::*;
pub use core::*;
pub use errors::*;
pub use fencing::*;
pub use node::*;
pub use notify::*;
pub use store::*;
pub use utils::*;
pub use watcher::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
//-----------------------------------------------------------
// Autometrics
/// autometrics: https://docs.autometrics.dev/rust/adding-alerts-and-slos
use autometrics::objectives::Objective;
use autometrics::objectives::ObjectiveLatency;
use autometrics::objectives::ObjectivePercentile;
const API_SLO: Objective = Objective::new("api")
    .success_rate(ObjectivePercentile::P99_9)
    .latency(ObjectiveLatency::Ms10, ObjectivePercentile::P99);
