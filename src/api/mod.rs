//! Operational surface for dashboards and load balancers.
//!
//! Everything answered here is eventually consistent: a reply may name a
//! holder whose lease already lapsed, or report a vacancy that was filled a
//! moment ago. Never gate correctness-critical work on it; use the fencing
//! token handed to the leader instead.

mod leader_query;
mod routes;

pub use leader_query::*;
pub use routes::*;
