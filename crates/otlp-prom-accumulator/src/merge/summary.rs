//! Summary merge rule: keep the datapoint with the latest timestamp.

use opentelemetry_proto::tonic::metrics::v1::{metric::Data, Metric, Summary, SummaryDataPoint};

use super::MergeOutcome;

/// Merges a summary datapoint into the stored value of its series.
///
/// A withdrawal removes the whole series rather than skipping the update.
pub fn merge(metric: &Metric, point: &SummaryDataPoint, previous: Option<&Metric>) -> MergeOutcome {
    super::latest_wins(point, previous, || {
        super::snapshot(
            metric,
            Data::Summary(Summary {
                data_points: vec![point.clone()],
            }),
        )
    })
}
