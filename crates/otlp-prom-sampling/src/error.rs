//! Errors for this crate.

use thiserror::Error;

/// An error configuring a sampling policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Counting period must be greater than zero")]
    InvalidPeriod,
    #[error("Frequency must be at least one trace per period")]
    InvalidFrequency,
}
