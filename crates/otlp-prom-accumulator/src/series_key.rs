//! Timeseries identity helpers.

use std::fmt::{self, Write};

use itertools::Itertools;
use opentelemetry_proto::tonic::common::v1::{any_value::Value, AnyValue, KeyValue};

const SEPARATOR: &str = "*";

const JOB_LABEL: &str = "job";
const INSTANCE_LABEL: &str = "instance";

const SERVICE_NAME: &str = "service.name";
const SERVICE_NAMESPACE: &str = "service.namespace";
const SERVICE_INSTANCE_ID: &str = "service.instance.id";

/// The `job` and `instance` labels a resource contributes to a series identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceLabels {
    pub job: Option<String>,
    pub instance: Option<String>,
}

impl ResourceLabels {
    /// Derives labels from resource attributes.
    ///
    /// `job` is `service.namespace/service.name`, or just `service.name` without a
    /// namespace. `instance` is `service.instance.id`.
    pub fn from_resource_attributes(attributes: &[KeyValue]) -> ResourceLabels {
        let job = find_attribute(attributes, SERVICE_NAME).map(|name| {
            match find_attribute(attributes, SERVICE_NAMESPACE) {
                Some(namespace) => format!("{namespace}/{name}"),
                None => name,
            }
        });
        ResourceLabels {
            job,
            instance: find_attribute(attributes, SERVICE_INSTANCE_ID),
        }
    }
}

/// A stable, hashable identity of one timeseries.
///
/// Built from metric type, scope name, metric name, datapoint attributes and the
/// resource's `job`/`instance` labels. Attribute order never changes the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey(String);

impl SeriesKey {
    /// Builds the key for a datapoint, deriving resource labels from `resource_attributes`.
    pub fn new(
        scope_name: &str,
        metric_type: &str,
        metric_name: &str,
        attributes: &[KeyValue],
        resource_attributes: &[KeyValue],
    ) -> SeriesKey {
        SeriesKey::with_labels(
            scope_name,
            metric_type,
            metric_name,
            attributes,
            &ResourceLabels::from_resource_attributes(resource_attributes),
        )
    }

    /// Builds the key for a datapoint from pre-computed resource labels.
    pub fn with_labels(
        scope_name: &str,
        metric_type: &str,
        metric_name: &str,
        attributes: &[KeyValue],
        labels: &ResourceLabels,
    ) -> SeriesKey {
        let mut key = String::with_capacity(
            metric_type.len() + scope_name.len() + metric_name.len() + 16 * (attributes.len() + 1),
        );
        key.push_str(metric_type);
        key.push_str(SEPARATOR);
        key.push_str(scope_name);
        key.push_str(SEPARATOR);
        key.push_str(metric_name);
        key.push_str(SEPARATOR);
        key.push_str(
            &attributes
                .iter()
                .map(|kv| format!("{}{SEPARATOR}{}", kv.key, render_value(kv.value.as_ref())))
                .sorted()
                .join(SEPARATOR),
        );
        if let Some(job) = &labels.job {
            push_label(&mut key, JOB_LABEL, job);
        }
        if let Some(instance) = &labels.instance {
            push_label(&mut key, INSTANCE_LABEL, instance);
        }
        SeriesKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn push_label(key: &mut String, label: &str, value: &str) {
    key.push_str(SEPARATOR);
    key.push_str(label);
    key.push_str(SEPARATOR);
    key.push_str(value);
}

fn find_attribute(attributes: &[KeyValue], key: &str) -> Option<String> {
    attributes
        .iter()
        .find(|kv| kv.key == key)
        .map(|kv| render_value(kv.value.as_ref()))
}

/// Renders an attribute value as a string. A missing value renders empty.
///
/// Scalars render bare; arrays and key/value lists render as compact JSON with
/// quoted strings and keys sorted, so distinct nested values never collide.
fn render_value(value: Option<&AnyValue>) -> String {
    match value.and_then(|v| v.value.as_ref()) {
        None => String::new(),
        Some(Value::StringValue(s)) => s.clone(),
        Some(Value::BoolValue(b)) => b.to_string(),
        Some(Value::IntValue(i)) => i.to_string(),
        Some(Value::DoubleValue(d)) => d.to_string(),
        Some(Value::BytesValue(bytes)) => hex(bytes),
        // Arrays and key/value lists.
        Some(nested) => to_json(Some(nested)).to_string(),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
        // Writing into a String cannot fail.
        let _ = write!(out, "{byte:02x}");
        out
    })
}

fn to_json(value: Option<&Value>) -> serde_json::Value {
    match value {
        None => serde_json::Value::Null,
        Some(Value::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Value::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Value::IntValue(i)) => serde_json::Value::from(*i),
        // Non-finite doubles have no JSON number form.
        Some(Value::DoubleValue(d)) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(d.to_string())),
        Some(Value::BytesValue(bytes)) => serde_json::Value::String(hex(bytes)),
        Some(Value::ArrayValue(array)) => serde_json::Value::Array(
            array
                .values
                .iter()
                .map(|v| to_json(v.value.as_ref()))
                .collect(),
        ),
        // serde_json maps are ordered by key.
        Some(Value::KvlistValue(list)) => serde_json::Value::Object(
            list.values
                .iter()
                .map(|kv| {
                    (
                        kv.key.clone(),
                        to_json(kv.value.as_ref().and_then(|v| v.value.as_ref())),
                    )
                })
                .collect(),
        ),
    }
}
