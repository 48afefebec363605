//! Failure modes of one dashboard load cycle.
//!
//! None of these reach the caller of `load()`: the aggregator logs them and
//! publishes the reset snapshot instead.

use thiserror::Error;

use crate::backend::BackendError;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Query '{query}' failed: {source}")]
    Backend {
        query: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("Query '{query}' timed out after {timeout_ms}ms")]
    Timeout { query: &'static str, timeout_ms: u64 },

    #[error("Appointment row could not be decoded: {0}")]
    Decode(String),
}
