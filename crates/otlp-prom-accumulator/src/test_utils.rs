//! Builders for OTLP metric messages used across tests.

use opentelemetry_proto::tonic::{
    common::v1::{any_value::Value, AnyValue, InstrumentationScope, KeyValue},
    metrics::v1::{
        metric::Data, number_data_point, summary_data_point::ValueAtQuantile,
        AggregationTemporality, DataPointFlags, ExponentialHistogram, Gauge, Histogram,
        HistogramDataPoint, Metric, NumberDataPoint, ResourceMetrics, ScopeMetrics, Sum, Summary,
        SummaryDataPoint,
    },
    resource::v1::Resource,
};

pub fn kv(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_owned(),
        value: Some(AnyValue {
            value: Some(Value::StringValue(value.to_owned())),
        }),
    }
}

pub fn kv_int(key: &str, value: i64) -> KeyValue {
    KeyValue {
        key: key.to_owned(),
        value: Some(AnyValue {
            value: Some(Value::IntValue(value)),
        }),
    }
}

/// Resource attributes with optional `service.*` entries.
pub fn service_resource(
    namespace: Option<&str>,
    name: Option<&str>,
    instance: Option<&str>,
) -> Vec<KeyValue> {
    let mut attributes = vec![kv("host.arch", "amd64")];
    if let Some(namespace) = namespace {
        attributes.push(kv("service.namespace", namespace));
    }
    if let Some(name) = name {
        attributes.push(kv("service.name", name));
    }
    if let Some(instance) = instance {
        attributes.push(kv("service.instance.id", instance));
    }
    attributes
}

/// A batch with one scope named `scope` holding the given metrics.
pub fn batch(resource_attributes: Vec<KeyValue>, metrics: Vec<Metric>) -> ResourceMetrics {
    ResourceMetrics {
        resource: Some(Resource {
            attributes: resource_attributes,
            ..Default::default()
        }),
        scope_metrics: vec![ScopeMetrics {
            scope: Some(InstrumentationScope {
                name: "scope".to_owned(),
                version: "1.0.0".to_owned(),
                ..Default::default()
            }),
            metrics,
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn metric(name: &str, data: Data) -> Metric {
    Metric {
        name: name.to_owned(),
        description: format!("{name} description"),
        unit: "1".to_owned(),
        data: Some(data),
        ..Default::default()
    }
}

pub fn gauge(name: &str, points: Vec<NumberDataPoint>) -> Metric {
    metric(
        name,
        Data::Gauge(Gauge {
            data_points: points,
        }),
    )
}

pub fn sum(
    name: &str,
    temporality: AggregationTemporality,
    is_monotonic: bool,
    points: Vec<NumberDataPoint>,
) -> Metric {
    metric(
        name,
        Data::Sum(Sum {
            data_points: points,
            aggregation_temporality: temporality as i32,
            is_monotonic,
        }),
    )
}

pub fn histogram(
    name: &str,
    temporality: AggregationTemporality,
    points: Vec<HistogramDataPoint>,
) -> Metric {
    metric(
        name,
        Data::Histogram(Histogram {
            data_points: points,
            aggregation_temporality: temporality as i32,
        }),
    )
}

pub fn summary(name: &str, points: Vec<SummaryDataPoint>) -> Metric {
    metric(
        name,
        Data::Summary(Summary {
            data_points: points,
        }),
    )
}

pub fn exponential_histogram(name: &str) -> Metric {
    metric(
        name,
        Data::ExponentialHistogram(ExponentialHistogram {
            data_points: Vec::new(),
            aggregation_temporality: AggregationTemporality::Cumulative as i32,
        }),
    )
}

pub fn int_point(attributes: Vec<KeyValue>, start: u64, time: u64, value: i64) -> NumberDataPoint {
    NumberDataPoint {
        attributes,
        start_time_unix_nano: start,
        time_unix_nano: time,
        value: Some(number_data_point::Value::AsInt(value)),
        ..Default::default()
    }
}

pub fn double_point(
    attributes: Vec<KeyValue>,
    start: u64,
    time: u64,
    value: f64,
) -> NumberDataPoint {
    NumberDataPoint {
        attributes,
        start_time_unix_nano: start,
        time_unix_nano: time,
        value: Some(number_data_point::Value::AsDouble(value)),
        ..Default::default()
    }
}

pub fn histogram_point(attributes: Vec<KeyValue>, time: u64, count: u64) -> HistogramDataPoint {
    HistogramDataPoint {
        attributes,
        start_time_unix_nano: 1,
        time_unix_nano: time,
        count,
        sum: Some(count as f64 * 2.0),
        bucket_counts: vec![count, 0],
        explicit_bounds: vec![10.0],
        ..Default::default()
    }
}

pub fn summary_point(attributes: Vec<KeyValue>, time: u64, count: u64) -> SummaryDataPoint {
    SummaryDataPoint {
        attributes,
        start_time_unix_nano: 1,
        time_unix_nano: time,
        count,
        sum: count as f64,
        quantile_values: vec![ValueAtQuantile {
            quantile: 0.5,
            value: 1.0,
        }],
        ..Default::default()
    }
}

/// Marks a datapoint as "no recorded value".
pub fn withdrawn<P: WithFlags>(mut point: P) -> P {
    point.set_flags(DataPointFlags::NoRecordedValueMask as u32);
    point
}

pub trait WithFlags {
    fn set_flags(&mut self, flags: u32);
}

impl WithFlags for NumberDataPoint {
    fn set_flags(&mut self, flags: u32) {
        self.flags = flags;
    }
}

impl WithFlags for HistogramDataPoint {
    fn set_flags(&mut self, flags: u32) {
        self.flags = flags;
    }
}

impl WithFlags for SummaryDataPoint {
    fn set_flags(&mut self, flags: u32) {
        self.flags = flags;
    }
}
