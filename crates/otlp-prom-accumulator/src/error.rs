//! Errors for this crate.

use thiserror::Error;

/// Reasons a metric is not accumulated, plus configuration failures.
///
/// None of these cross `accumulate`/`collect`; they are diagnostics for logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Metric {name} has unsupported type {data_type}")]
    UnsupportedMetricType {
        name: String,
        data_type: &'static str,
    },
    #[error("Sum {0} has an unspecified aggregation temporality")]
    UnspecifiedTemporality(String),
    #[error("Sum {0} is a non-monotonic delta")]
    NonMonotonicDelta(String),
    #[error("Histogram {0} is not cumulative")]
    NonCumulativeHistogram(String),
    #[error("Metric expiration must be greater than zero")]
    InvalidExpiration,
}
