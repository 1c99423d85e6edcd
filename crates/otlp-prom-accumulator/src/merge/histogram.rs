//! Histogram merge rule: later cumulative snapshots replace earlier ones.

use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data, AggregationTemporality, Histogram, HistogramDataPoint, Metric,
};

use super::MergeOutcome;
use crate::Error;

/// Merges a histogram datapoint into the stored value of its series.
///
/// Only cumulative histograms are accepted; bucket counts are never merged across
/// datapoints.
pub fn merge(
    metric: &Metric,
    histogram: &Histogram,
    point: &HistogramDataPoint,
    previous: Option<&Metric>,
) -> MergeOutcome {
    if histogram.aggregation_temporality != AggregationTemporality::Cumulative as i32 {
        return MergeOutcome::Drop(Error::NonCumulativeHistogram(metric.name.clone()));
    }
    super::latest_wins(point, previous, || {
        super::snapshot(
            metric,
            Data::Histogram(Histogram {
                data_points: vec![point.clone()],
                aggregation_temporality: AggregationTemporality::Cumulative as i32,
            }),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{histogram as histogram_metric, histogram_point, withdrawn};

    fn definition(metric: &Metric) -> &Histogram {
        match &metric.data {
            Some(Data::Histogram(h)) => h,
            _ => panic!("Expected histogram data"),
        }
    }

    #[test]
    fn test_histogram_cumulative_replaces() {
        let metric = histogram_metric("sizes", AggregationTemporality::Cumulative, vec![]);
        let first = histogram_point(vec![], 100, 3);
        let MergeOutcome::Insert(stored) = merge(&metric, definition(&metric), &first, None)
        else {
            panic!("Expected insert");
        };

        let second = histogram_point(vec![], 200, 5);
        let outcome = merge(&metric, definition(&metric), &second, Some(&stored));
        // No bucket merging: the later snapshot is stored verbatim.
        assert_eq!(
            outcome,
            MergeOutcome::Replace(histogram_metric(
                "sizes",
                AggregationTemporality::Cumulative,
                vec![second]
            ))
        );
        assert_eq!(
            merge(&metric, definition(&metric), &histogram_point(vec![], 50, 1), Some(&stored)),
            MergeOutcome::RejectStale
        );
    }

    #[test]
    fn test_histogram_non_cumulative_dropped() {
        for temporality in [AggregationTemporality::Delta, AggregationTemporality::Unspecified] {
            let metric = histogram_metric("sizes", temporality, vec![]);
            assert_eq!(
                merge(&metric, definition(&metric), &histogram_point(vec![], 100, 3), None),
                MergeOutcome::Drop(Error::NonCumulativeHistogram("sizes".to_owned()))
            );
        }
    }

    #[test]
    fn test_histogram_withdrawal() {
        let metric = histogram_metric("sizes", AggregationTemporality::Cumulative, vec![]);
        let point = withdrawn(histogram_point(vec![], 100, 3));
        assert_eq!(merge(&metric, definition(&metric), &point, None), MergeOutcome::Withdraw);

        // Drop conditions are checked before the withdrawal flag.
        let delta = histogram_metric("sizes", AggregationTemporality::Delta, vec![]);
        assert!(matches!(
            merge(&delta, definition(&delta), &point, None),
            MergeOutcome::Drop(_)
        ));
    }
}
