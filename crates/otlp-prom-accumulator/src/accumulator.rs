//! Accumulation of OTLP metric batches into per-series current values.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use opentelemetry_proto::tonic::{
    common::v1::InstrumentationScope,
    metrics::v1::{Metric, ResourceMetrics},
};

use crate::{
    merge::{gauge, histogram, sum, summary, DataPoint, MergeOutcome, MetricKind},
    series_key::{ResourceLabels, SeriesKey},
    store::{AccumulatedValue, AggregationStore, ResourceAttributes, Update},
    AccumulatorConfig, Error,
};

/// The live series returned by a collection, as two parallel sequences.
///
/// `metrics[i]` was produced by a resource with attributes `resource_attributes[i]`.
pub type Collected = (Vec<Metric>, Vec<ResourceAttributes>);

/// Keeps the last value of every series it has seen.
pub struct Accumulator {
    store: AggregationStore,
    /// How long a series is served after it was updated.
    metric_expiration: Duration,
}

/// Per-batch data shared by every datapoint of a scope.
struct BatchContext<'a> {
    resource_attributes: &'a ResourceAttributes,
    labels: &'a ResourceLabels,
    scope: &'a Arc<InstrumentationScope>,
    now: SystemTime,
}

/// How a single datapoint merge ended, once applied to the store.
enum Applied {
    Accepted,
    Stale,
    Withdrawn,
    Dropped(Error),
}

impl Accumulator {
    /// Creates an empty accumulator, rejecting an invalid configuration.
    pub fn new(config: &AccumulatorConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            store: AggregationStore::new(),
            metric_expiration: config.metric_expiration,
        })
    }

    /// The underlying series storage.
    pub fn store(&self) -> &AggregationStore {
        &self.store
    }

    /// Stores one datapoint per series of the batch.
    ///
    /// Returns how many datapoints were inserted or replaced. Stale, withdrawn and
    /// invalid datapoints are not counted, and never fail the batch.
    pub fn accumulate(&self, resource_metrics: &ResourceMetrics) -> usize {
        self.accumulate_at(resource_metrics, SystemTime::now())
    }

    /// [`Accumulator::accumulate`], with `now` as the update time.
    pub fn accumulate_at(&self, resource_metrics: &ResourceMetrics, now: SystemTime) -> usize {
        // Copied once, the batch may be released after this call.
        let resource_attributes: ResourceAttributes = resource_metrics
            .resource
            .as_ref()
            .map(|r| Arc::from(r.attributes.as_slice()))
            .unwrap_or_else(|| Arc::from(Vec::new()));
        let labels = ResourceLabels::from_resource_attributes(&resource_attributes);

        let mut processed = 0;
        for scope_metrics in &resource_metrics.scope_metrics {
            let scope = Arc::new(scope_metrics.scope.clone().unwrap_or_default());
            let ctx = BatchContext {
                resource_attributes: &resource_attributes,
                labels: &labels,
                scope: &scope,
                now,
            };
            for metric in &scope_metrics.metrics {
                processed += self.accumulate_metric(&ctx, metric);
            }
        }
        processed
    }

    fn accumulate_metric(&self, ctx: &BatchContext<'_>, metric: &Metric) -> usize {
        tracing::debug!(metric = %metric.name, "accumulating metric");
        let kind = match MetricKind::of(metric) {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(metric = %metric.name, error = %e, "failed to translate metric");
                return 0;
            }
        };
        let type_name = kind.type_name();
        match kind {
            MetricKind::Gauge(g) => {
                self.accumulate_points(ctx, metric, type_name, &g.data_points, |p, prev| {
                    gauge::merge(metric, p, prev)
                })
            }
            MetricKind::Sum(s) => {
                self.accumulate_points(ctx, metric, type_name, &s.data_points, |p, prev| {
                    sum::merge(metric, s, p, prev)
                })
            }
            MetricKind::Histogram(h) => {
                self.accumulate_points(ctx, metric, type_name, &h.data_points, |p, prev| {
                    histogram::merge(metric, h, p, prev)
                })
            }
            MetricKind::Summary(s) => {
                self.accumulate_points(ctx, metric, type_name, &s.data_points, |p, prev| {
                    summary::merge(metric, p, prev)
                })
            }
        }
    }

    /// Merges the datapoints of one metric, in order.
    ///
    /// A withdrawal ends the metric and reports zero processed points for it.
    fn accumulate_points<P: DataPoint>(
        &self,
        ctx: &BatchContext<'_>,
        metric: &Metric,
        type_name: &str,
        points: &[P],
        merge: impl Fn(&P, Option<&Metric>) -> MergeOutcome,
    ) -> usize {
        let mut processed = 0;
        for point in points {
            let key = SeriesKey::with_labels(
                &ctx.scope.name,
                type_name,
                &metric.name,
                point.attributes(),
                ctx.labels,
            );
            let applied = self.store.update(key, |previous| {
                match merge(point, previous.map(|v| &v.value)) {
                    MergeOutcome::Insert(value) | MergeOutcome::Replace(value) => (
                        Update::Put(AccumulatedValue {
                            value,
                            resource_attributes: ctx.resource_attributes.clone(),
                            scope: ctx.scope.clone(),
                            updated: ctx.now,
                        }),
                        Applied::Accepted,
                    ),
                    MergeOutcome::RejectStale => (Update::Keep, Applied::Stale),
                    MergeOutcome::Withdraw => (Update::Remove, Applied::Withdrawn),
                    MergeOutcome::Drop(reason) => (Update::Keep, Applied::Dropped(reason)),
                }
            });
            match applied {
                Applied::Accepted => processed += 1,
                Applied::Stale => {
                    tracing::trace!(metric = %metric.name, "dropping stale datapoint");
                }
                Applied::Withdrawn => {
                    tracing::trace!(metric = %metric.name, "series withdrawn");
                    return 0;
                }
                Applied::Dropped(reason) => {
                    // Drop conditions hold for the whole metric.
                    tracing::debug!(metric = %metric.name, %reason, "dropping metric");
                    return processed;
                }
            }
        }
        processed
    }

    /// Returns the live series, pruning the ones that expired.
    pub fn collect(&self) -> Collected {
        self.collect_at(SystemTime::now())
    }

    /// [`Accumulator::collect`], expiring series relative to `now`.
    pub fn collect_at(&self, now: SystemTime) -> Collected {
        tracing::debug!("accumulator collect called");
        let mut metrics = Vec::new();
        let mut resource_attributes = Vec::new();
        self.store.retain(|_, v| {
            if self.is_expired(v, now) {
                tracing::debug!(metric = %v.value.name, "metric expired");
                return false;
            }
            metrics.push(v.value.clone());
            resource_attributes.push(v.resource_attributes.clone());
            true
        });
        (metrics, resource_attributes)
    }

    fn is_expired(&self, value: &AccumulatedValue, now: SystemTime) -> bool {
        // Values updated "in the future" (clock steps) are live.
        now.duration_since(value.updated)
            .is_ok_and(|age| age > self.metric_expiration)
    }
}
