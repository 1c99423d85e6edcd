//! Errors for this crate.

use thiserror::Error;

/// An error starting or running the collector.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    AccumulatorConfigError(#[from] otlp_prom_accumulator::Error),
    #[error(transparent)]
    SamplingConfigError(#[from] otlp_prom_sampling::Error),
    #[error("Report interval must be greater than zero")]
    InvalidReportInterval,
    #[error(transparent)]
    TonicTransportError(#[from] tonic::transport::Error),
    #[error(transparent)]
    ArgumentError(#[from] clap::Error),
}
