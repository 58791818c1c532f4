use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("concurrency_limit must be at least 1")]
    ZeroConcurrency,

    #[error("task_timeout_secs must be at least 1")]
    ZeroTaskTimeout,

    #[error("http_timeout_secs must be at least 1")]
    ZeroHttpTimeout,
}

/// Tuning knobs for one aggregation run.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Maximum number of per-facility fetch tasks in flight at once.
    /// Additional tasks wait at the admission gate; none are rejected.
    pub concurrency_limit: usize,

    /// Deadline for one facility's detail plus availability fetches.
    /// Exceeding it degrades only that facility's entry.
    pub task_timeout_secs: u64,

    /// Timeout applied to each individual upstream HTTP request.
    pub http_timeout_secs: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 8,
            task_timeout_secs: 10,
            http_timeout_secs: 20,
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.concurrency_limit == 0 {
            return Err(ValidationError::ZeroConcurrency);
        }
        if self.task_timeout_secs == 0 {
            return Err(ValidationError::ZeroTaskTimeout);
        }
        if self.http_timeout_secs == 0 {
            return Err(ValidationError::ZeroHttpTimeout);
        }
        Ok(())
    }
}
