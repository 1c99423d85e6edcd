use std::{net::SocketAddr, time::Duration};

use clap::Parser;
use otlp_prom_accumulator::AccumulatorConfig;
use otlp_prom_collector::{Collector, CollectorConfig, Error};
use otlp_prom_sampling::UniqueTracePathConfig;
use tracing_subscriber::EnvFilter;

/// An OTLP receiver accumulating metrics into their current per-series values.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to serve OTLP/gRPC on.
    #[arg(short, long, env = "OTLP_PROM_LISTEN", default_value = "0.0.0.0:4317")]
    listen: SocketAddr,

    /// Seconds a series is kept after its last update.
    #[arg(long, env = "OTLP_PROM_METRIC_EXPIRATION_SECS", default_value_t = 300)]
    metric_expiration_secs: u64,

    /// Seconds between sweeps of expired series.
    #[arg(long, env = "OTLP_PROM_REPORT_INTERVAL_SECS", default_value_t = 60)]
    report_interval_secs: u64,

    /// Enables trace sampling with this unique trace path window, in seconds.
    #[arg(long, env = "OTLP_PROM_TRACE_PATH_PERIOD_SECS")]
    trace_path_period_secs: Option<u64>,

    /// Traces sampled per unique path and window.
    #[arg(long, env = "OTLP_PROM_TRACE_PATH_FREQUENCY", default_value_t = 1)]
    trace_path_frequency: u64,
}

impl From<Args> for CollectorConfig {
    fn from(args: Args) -> Self {
        CollectorConfig {
            listen_address: args.listen,
            report_interval: Duration::from_secs(args.report_interval_secs),
            accumulator: AccumulatorConfig {
                metric_expiration: Duration::from_secs(args.metric_expiration_secs),
            },
            sampling: args
                .trace_path_period_secs
                .map(|period| UniqueTracePathConfig {
                    period: Duration::from_secs(period),
                    frequency: args.trace_path_frequency,
                }),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::try_parse()?;
    let collector = Collector::new(args.into())?;
    collector.run().await
}
