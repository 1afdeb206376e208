//! Runtime election parameters.
//!
//! A [`ConfigWatcher`] polls (or is woken by) a [`ConfigSource`] for
//! `leaseTTL`, `renewalIntervalFraction`, `jitterMinMs` and `jitterMaxMs`
//! and swaps the shared [`ElectionParams`](crate::ElectionParams).

mod source;
#[allow(clippy::module_inception)]
mod watcher;

pub use source::*;
pub use watcher::*;

#[cfg(test)]
mod watcher_test;
