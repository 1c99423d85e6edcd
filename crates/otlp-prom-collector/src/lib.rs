//! OTLP/gRPC services feeding the metric accumulator and the trace sampler.
//!
//! Metrics pushed over OTLP are accumulated into their current per-series value;
//! a periodic sweep collects the accumulator, which prunes series that stopped
//! reporting. Traces are evaluated by the unique trace path policy.

mod config;
mod error;

use std::{collections::BTreeMap, sync::Arc};

pub use config::CollectorConfig;
pub use error::Error;
use opentelemetry_proto::tonic::{
    collector::{
        metrics::v1::{
            metrics_service_server::{MetricsService, MetricsServiceServer},
            ExportMetricsServiceRequest, ExportMetricsServiceResponse,
        },
        trace::v1::{
            trace_service_server::{TraceService, TraceServiceServer},
            ExportTraceServiceRequest, ExportTraceServiceResponse,
        },
    },
    trace::v1::{ResourceSpans, ScopeSpans},
};
use otlp_prom_accumulator::Accumulator;
use otlp_prom_sampling::{Decision, UniqueTracePathFilter};
use tokio::time::MissedTickBehavior;
use tonic::{transport::Server, Request, Response, Status};

/// Accumulates every exported batch.
pub struct MetricsIngest {
    accumulator: Arc<Accumulator>,
}

impl MetricsIngest {
    pub fn new(accumulator: Arc<Accumulator>) -> Self {
        Self { accumulator }
    }
}

#[tonic::async_trait]
impl MetricsService for MetricsIngest {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<Response<ExportMetricsServiceResponse>, Status> {
        let request = request.into_inner();
        // Invalid series are dropped, never rejected back to the sender.
        let processed: usize = request
            .resource_metrics
            .iter()
            .map(|rm| self.accumulator.accumulate(rm))
            .sum();
        tracing::debug!(
            resources = request.resource_metrics.len(),
            processed,
            "accumulated metrics export"
        );
        Ok(Response::new(ExportMetricsServiceResponse {
            partial_success: None,
        }))
    }
}

/// Evaluates each trace of an export against the unique trace path policy.
pub struct TraceSampling {
    filter: Arc<UniqueTracePathFilter>,
}

impl TraceSampling {
    pub fn new(filter: Arc<UniqueTracePathFilter>) -> Self {
        Self { filter }
    }
}

#[tonic::async_trait]
impl TraceService for TraceSampling {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<Response<ExportTraceServiceResponse>, Status> {
        let request = request.into_inner();
        let (mut sampled, mut not_sampled) = (0usize, 0usize);
        for trace in group_by_trace(&request.resource_spans).values() {
            match self.filter.evaluate(std::slice::from_ref(trace)) {
                Decision::Sampled => sampled += 1,
                Decision::NotSampled => not_sampled += 1,
            }
        }
        tracing::debug!(sampled, not_sampled, "evaluated trace export");
        Ok(Response::new(ExportTraceServiceResponse {
            partial_success: None,
        }))
    }
}

/// Regroups the spans of an export by trace id.
fn group_by_trace(resource_spans: &[ResourceSpans]) -> BTreeMap<Vec<u8>, ResourceSpans> {
    let mut traces: BTreeMap<Vec<u8>, ResourceSpans> = BTreeMap::new();
    for span in resource_spans
        .iter()
        .flat_map(|rs| &rs.scope_spans)
        .flat_map(|ss| &ss.spans)
    {
        let trace = traces
            .entry(span.trace_id.clone())
            .or_insert_with(|| ResourceSpans {
                scope_spans: vec![ScopeSpans::default()],
                ..Default::default()
            });
        trace.scope_spans[0].spans.push(span.clone());
    }
    traces
}

/// Runs the OTLP services and the accumulator sweep.
pub struct Collector {
    config: CollectorConfig,
    accumulator: Arc<Accumulator>,
    sampler: Option<Arc<UniqueTracePathFilter>>,
}

impl Collector {
    pub fn new(config: CollectorConfig) -> Result<Self, Error> {
        config.validate()?;
        let sampler = match &config.sampling {
            Some(sampling) => Some(Arc::new(UniqueTracePathFilter::new(sampling)?)),
            None => None,
        };
        Ok(Self {
            accumulator: Arc::new(Accumulator::new(&config.accumulator)?),
            sampler,
            config,
        })
    }

    pub fn accumulator(&self) -> &Arc<Accumulator> {
        &self.accumulator
    }

    /// Serves until the server fails.
    pub async fn run(&self) -> Result<(), Error> {
        let mut router = Server::builder().add_service(MetricsServiceServer::new(
            MetricsIngest::new(self.accumulator.clone()),
        ));
        let rotation = match &self.sampler {
            Some(filter) => {
                tracing::info!("adding OTLP trace sampling service");
                router = router.add_service(TraceServiceServer::new(TraceSampling::new(
                    filter.clone(),
                )));
                Some(filter.spawn_rotation())
            }
            None => None,
        };

        tracing::info!(address = %self.config.listen_address, "serving OTLP");
        let result = tokio::select! {
            r = router.serve(self.config.listen_address) => r,
            _ = self.sweep() => Ok(()),
        };
        if let Some(rotation) = rotation {
            rotation.abort();
        }
        Ok(result?)
    }

    /// Collects the accumulator every report interval, pruning expired series.
    async fn sweep(&self) {
        let mut ticks = tokio::time::interval(self.config.report_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            let (metrics, _) = self.accumulator.collect();
            tracing::info!(live_series = metrics.len(), "swept accumulator");
        }
    }
}
