use thiserror::Error;

use crate::client::ApiError;

/// Result type alias for aggregator operations
pub type Result<T, E = AggregateError> = std::result::Result<T, E>;

/// Errors surfaced to the caller of an aggregation run.
///
/// Only failures of the top-level facility listing are fatal; per-facility
/// fetch failures are absorbed into partial results and never reach the
/// caller as errors.
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("failed to fetch facility listing: {0}")]
    Listing(#[source] ApiError),

    #[error("upstream rejected the session credentials")]
    Unauthorized,
}
