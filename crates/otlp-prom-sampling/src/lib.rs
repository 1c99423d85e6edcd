//! Trace sampling policies.

mod error;
mod unique_trace_path;

pub use error::Error;
pub use unique_trace_path::{UniqueTracePathConfig, UniqueTracePathFilter};

/// Whether a trace should be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Sampled,
    NotSampled,
}
