//! Helpers shared by the unit tests: logging, fast timing parameters, a
//! fault-injecting store and agent cluster setup.
mod common;
mod faulty_store;

pub use common::*;
pub use faulty_store::*;
