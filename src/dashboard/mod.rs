//! Live dashboard aggregation.
//!
//! Each cycle issues six independent queries against a `DashboardBackend`
//! (latest 50 appointment-detail rows, patient count, and full-population
//! scans of agents, platforms, locations and service categories), buckets
//! them into a `DashboardSnapshot`, and publishes it to subscribers. A poller
//! repeats the cycle on a fixed interval until the aggregator is destroyed.

mod aggregates;
mod aggregator;
mod error;
mod fetch;
mod poller;
mod types;

pub use aggregates::*;
pub use aggregator::*;
pub use error::*;
pub use fetch::*;
pub use poller::PollerHandle;
pub use types::*;

// ── Tests ──────────────────────────────────────────────────────────────────
