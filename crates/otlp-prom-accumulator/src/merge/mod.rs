//! Per-type merge rules.
//!
//! Each rule is a pure function from the currently stored single-point metric (if
//! any) and a newly observed datapoint to a [`MergeOutcome`]. Rules never touch the
//! store; the accumulator applies their outcome atomically per series.

pub mod gauge;
pub mod histogram;
pub mod sum;
pub mod summary;

use opentelemetry_proto::tonic::{
    common::v1::KeyValue,
    metrics::v1::{
        metric::Data, DataPointFlags, Gauge, Histogram, HistogramDataPoint, Metric,
        NumberDataPoint, Sum, Summary, SummaryDataPoint,
    },
};

use crate::Error;

/// What a merge rule decided for one datapoint.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// No previous value, store this one.
    Insert(Metric),
    /// Supersede the previous value with this one.
    Replace(Metric),
    /// The datapoint is older than the stored value; keep the stored value.
    RejectStale,
    /// The producer reported "no recorded value"; remove the series.
    Withdraw,
    /// No accumulation rule exists for the datapoint.
    Drop(Error),
}

/// The metric kinds this engine knows how to accumulate.
#[derive(Debug, Clone, Copy)]
pub enum MetricKind<'a> {
    Gauge(&'a Gauge),
    Sum(&'a Sum),
    Histogram(&'a Histogram),
    Summary(&'a Summary),
}

impl<'a> MetricKind<'a> {
    /// Classifies a metric, failing for types without a merge rule.
    pub fn of(metric: &'a Metric) -> Result<MetricKind<'a>, Error> {
        match &metric.data {
            Some(Data::Gauge(gauge)) => Ok(MetricKind::Gauge(gauge)),
            Some(Data::Sum(sum)) => Ok(MetricKind::Sum(sum)),
            Some(Data::Histogram(histogram)) => Ok(MetricKind::Histogram(histogram)),
            Some(Data::Summary(summary)) => Ok(MetricKind::Summary(summary)),
            Some(Data::ExponentialHistogram(_)) => Err(Error::UnsupportedMetricType {
                name: metric.name.clone(),
                data_type: "ExponentialHistogram",
            }),
            None => Err(Error::UnsupportedMetricType {
                name: metric.name.clone(),
                data_type: "Empty",
            }),
        }
    }

    /// Type tag used in series keys.
    pub fn type_name(&self) -> &'static str {
        match self {
            MetricKind::Gauge(_) => "Gauge",
            MetricKind::Sum(_) => "Sum",
            MetricKind::Histogram(_) => "Histogram",
            MetricKind::Summary(_) => "Summary",
        }
    }
}

/// Common view over the OTLP datapoint types.
pub trait DataPoint {
    fn attributes(&self) -> &[KeyValue];
    fn time_unix_nano(&self) -> u64;
    fn flags(&self) -> u32;

    /// Whether the producer flagged this point as the end of its series.
    fn is_withdrawn(&self) -> bool {
        self.flags() & DataPointFlags::NoRecordedValueMask as u32 != 0
    }
}

impl DataPoint for NumberDataPoint {
    fn attributes(&self) -> &[KeyValue] {
        &self.attributes
    }
    fn time_unix_nano(&self) -> u64 {
        self.time_unix_nano
    }
    fn flags(&self) -> u32 {
        self.flags
    }
}

impl DataPoint for HistogramDataPoint {
    fn attributes(&self) -> &[KeyValue] {
        &self.attributes
    }
    fn time_unix_nano(&self) -> u64 {
        self.time_unix_nano
    }
    fn flags(&self) -> u32 {
        self.flags
    }
}

impl DataPoint for SummaryDataPoint {
    fn attributes(&self) -> &[KeyValue] {
        &self.attributes
    }
    fn time_unix_nano(&self) -> u64 {
        self.time_unix_nano
    }
    fn flags(&self) -> u32 {
        self.flags
    }
}

/// Timestamp of the single datapoint held by a stored metric.
fn stored_time_unix_nano(metric: &Metric) -> Option<u64> {
    match metric.data.as_ref()? {
        Data::Gauge(gauge) => gauge.data_points.first().map(|p| p.time_unix_nano),
        Data::Sum(sum) => sum.data_points.first().map(|p| p.time_unix_nano),
        Data::Histogram(histogram) => histogram.data_points.first().map(|p| p.time_unix_nano),
        Data::Summary(summary) => summary.data_points.first().map(|p| p.time_unix_nano),
        Data::ExponentialHistogram(histogram) => {
            histogram.data_points.first().map(|p| p.time_unix_nano)
        }
    }
}

/// Keep-the-latest rule shared by gauges, histograms and summaries.
///
/// Equal timestamps replace the stored value.
fn latest_wins<P: DataPoint>(
    point: &P,
    previous: Option<&Metric>,
    build: impl FnOnce() -> Metric,
) -> MergeOutcome {
    if point.is_withdrawn() {
        return MergeOutcome::Withdraw;
    }
    match previous {
        None => MergeOutcome::Insert(build()),
        Some(stored) => match stored_time_unix_nano(stored) {
            Some(stored_time) if point.time_unix_nano() < stored_time => MergeOutcome::RejectStale,
            _ => MergeOutcome::Replace(build()),
        },
    }
}

/// A new single-point metric carrying the producing metric's metadata.
fn snapshot(metric: &Metric, data: Data) -> Metric {
    Metric {
        name: metric.name.clone(),
        description: metric.description.clone(),
        unit: metric.unit.clone(),
        data: Some(data),
        ..Default::default()
    }
}
