//! Configuration for the collector service.

use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use otlp_prom_accumulator::AccumulatorConfig;
use otlp_prom_sampling::UniqueTracePathConfig;

use crate::Error;

/// Default OTLP/gRPC port.
const DEFAULT_OTLP_PORT: u16 = 4317;
const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the collector.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Address the OTLP/gRPC services listen on.
    pub listen_address: SocketAddr,
    /// Interval between sweeps that prune expired series.
    pub report_interval: Duration,
    pub accumulator: AccumulatorConfig,
    /// Trace sampling, disabled when absent.
    pub sampling: Option<UniqueTracePathConfig>,
}

impl CollectorConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.report_interval.is_zero() {
            return Err(Error::InvalidReportInterval);
        }
        self.accumulator.validate()?;
        if let Some(sampling) = &self.sampling {
            sampling.validate()?;
        }
        Ok(())
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_OTLP_PORT)),
            report_interval: DEFAULT_REPORT_INTERVAL,
            accumulator: AccumulatorConfig::default(),
            sampling: None,
        }
    }
}
