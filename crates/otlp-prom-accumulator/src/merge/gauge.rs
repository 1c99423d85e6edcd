//! Gauge merge rule: keep the datapoint with the latest timestamp.

use opentelemetry_proto::tonic::metrics::v1::{metric::Data, Gauge, Metric, NumberDataPoint};

use super::MergeOutcome;

/// Merges a gauge datapoint into the stored value of its series.
pub fn merge(metric: &Metric, point: &NumberDataPoint, previous: Option<&Metric>) -> MergeOutcome {
    super::latest_wins(point, previous, || {
        super::snapshot(
            metric,
            Data::Gauge(Gauge {
                data_points: vec![point.clone()],
            }),
        )
    })
}
