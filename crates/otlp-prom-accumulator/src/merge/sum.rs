//! Sum merge rule.
//!
//! Cumulative sums keep the latest datapoint. Monotonic delta sums are converted to
//! cumulative by adding each delta onto the stored total. Stored sums are always
//! cumulative.

use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data, number_data_point::Value, AggregationTemporality, Metric, NumberDataPoint, Sum,
};

use super::{DataPoint, MergeOutcome};
use crate::Error;

/// Merges a sum datapoint into the stored value of its series.
pub fn merge(
    metric: &Metric,
    sum: &Sum,
    point: &NumberDataPoint,
    previous: Option<&Metric>,
) -> MergeOutcome {
    let temporality = AggregationTemporality::try_from(sum.aggregation_temporality)
        .unwrap_or(AggregationTemporality::Unspecified);
    match temporality {
        AggregationTemporality::Unspecified => {
            return MergeOutcome::Drop(Error::UnspecifiedTemporality(metric.name.clone()))
        }
        AggregationTemporality::Delta if !sum.is_monotonic => {
            return MergeOutcome::Drop(Error::NonMonotonicDelta(metric.name.clone()))
        }
        _ => {}
    }
    if point.is_withdrawn() {
        return MergeOutcome::Withdraw;
    }

    let stored = previous.and_then(stored_point);
    if let Some(stored) = stored {
        if point.time_unix_nano < stored.time_unix_nano {
            return MergeOutcome::RejectStale;
        }
    }

    let mut merged = point.clone();
    if temporality == AggregationTemporality::Delta {
        if let Some(stored) = stored {
            merged.start_time_unix_nano = stored.start_time_unix_nano;
            merged.value = add(point.value.as_ref(), stored.value.as_ref());
        }
    }
    let value = super::snapshot(
        metric,
        Data::Sum(Sum {
            data_points: vec![merged],
            aggregation_temporality: AggregationTemporality::Cumulative as i32,
            is_monotonic: sum.is_monotonic,
        }),
    );
    match previous {
        None => MergeOutcome::Insert(value),
        Some(_) => MergeOutcome::Replace(value),
    }
}

fn stored_point(metric: &Metric) -> Option<&NumberDataPoint> {
    match &metric.data {
        Some(Data::Sum(sum)) => sum.data_points.first(),
        _ => None,
    }
}

/// Adds a delta onto a stored total of the same numeric type.
///
/// A stored total of a different type contributes nothing. Integers saturate.
fn add(delta: Option<&Value>, stored: Option<&Value>) -> Option<Value> {
    match (delta?, stored) {
        (Value::AsInt(d), Some(Value::AsInt(s))) => Some(Value::AsInt(d.saturating_add(*s))),
        (Value::AsDouble(d), Some(Value::AsDouble(s))) => Some(Value::AsDouble(d + s)),
        (Value::AsInt(d), _) => Some(Value::AsInt(*d)),
        (Value::AsDouble(d), _) => Some(Value::AsDouble(*d)),
    }
}
