//! Concurrent storage of accumulated series.

use std::{sync::Arc, time::SystemTime};

use opentelemetry_proto::tonic::{
    common::v1::{InstrumentationScope, KeyValue},
    metrics::v1::Metric,
};
use scc::hash_map::Entry;

use crate::series_key::SeriesKey;

/// Resource attributes of the batch that produced a value, shared across its series.
pub type ResourceAttributes = Arc<[KeyValue]>;

/// The current value of one series.
///
/// Immutable once stored; an update replaces the whole value.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatedValue {
    /// A metric with exactly one datapoint.
    pub value: Metric,
    /// Resource attributes, used downstream for `job`/`instance` labels.
    pub resource_attributes: ResourceAttributes,
    /// Scope that produced the metric.
    pub scope: Arc<InstrumentationScope>,
    /// When the value was last changed.
    pub updated: SystemTime,
}

/// What to do with a series after inspecting its stored value.
#[derive(Debug)]
pub enum Update {
    /// Store this value, replacing anything present.
    Put(AccumulatedValue),
    /// Remove the series.
    Remove,
    /// Leave the series as it is.
    Keep,
}

/// Map from series key to accumulated value, safe for concurrent writers.
///
/// Reads and writes to one key are serialized by the map's bucket locks, so a value
/// is always observed whole.
#[derive(Default)]
pub struct AggregationStore {
    series: scc::HashMap<SeriesKey, Arc<AccumulatedValue>>,
}

impl AggregationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current value of a series.
    pub fn get(&self, key: &SeriesKey) -> Option<Arc<AccumulatedValue>> {
        self.series.read_sync(key, |_, v| v.clone())
    }

    /// Stores a value, replacing any previous one.
    pub fn put(&self, key: SeriesKey, value: AccumulatedValue) {
        self.update(key, |_| (Update::Put(value), ()))
    }

    /// Removes a series, returning whether it existed.
    pub fn delete(&self, key: &SeriesKey) -> bool {
        self.series.remove_sync(key).is_some()
    }

    /// Atomically reads a series and applies the decided update.
    ///
    /// `decide` runs while the key is locked; concurrent updates to the same key
    /// observe each other's results, never a shared stale value.
    pub fn update<R>(
        &self,
        key: SeriesKey,
        decide: impl FnOnce(Option<&AccumulatedValue>) -> (Update, R),
    ) -> R {
        match self.series.entry_sync(key) {
            Entry::Occupied(mut occupied) => {
                let (update, result) = decide(Some(occupied.get().as_ref()));
                match update {
                    Update::Put(value) => {
                        occupied.insert(Arc::new(value));
                    }
                    Update::Remove => {
                        occupied.remove();
                    }
                    Update::Keep => {}
                }
                result
            }
            Entry::Vacant(vacant) => {
                let (update, result) = decide(None);
                if let Update::Put(value) = update {
                    vacant.insert_entry(Arc::new(value));
                }
                result
            }
        }
    }

    /// Visits every series.
    ///
    /// Weakly consistent: series added or removed during the scan may or may not be
    /// visited.
    pub fn for_each(&self, mut visit: impl FnMut(&SeriesKey, &AccumulatedValue)) {
        self.series.iter_sync(|k, v| {
            visit(k, v);
            true
        });
    }

    /// Keeps only the series for which `keep` returns true.
    pub fn retain(&self, mut keep: impl FnMut(&SeriesKey, &AccumulatedValue) -> bool) {
        self.series.retain_sync(|k, v| keep(k, v));
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{gauge, int_point};
    use std::time::Duration;

    fn value(v: i64) -> AccumulatedValue {
        AccumulatedValue {
            value: gauge("g", vec![int_point(vec![], 0, v as u64, v)]),
            resource_attributes: Arc::from(Vec::new()),
            scope: Arc::new(InstrumentationScope::default()),
            updated: SystemTime::UNIX_EPOCH + Duration::from_secs(v as u64),
        }
    }

    fn key(name: &str) -> SeriesKey {
        SeriesKey::new("s", "Gauge", name, &[], &[])
    }

    #[test]
    fn test_put_get_delete() {
        let store = AggregationStore::new();
        assert!(store.is_empty());
        store.put(key("a"), value(1));
        store.put(key("a"), value(2));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key("a")).as_deref(), Some(&value(2)));

        assert!(store.delete(&key("a")));
        assert!(!store.delete(&key("a")));
        assert!(store.get(&key("a")).is_none());
    }

    #[test]
    fn test_update_sees_previous() {
        let store = AggregationStore::new();
        let inserted = store.update(key("a"), |previous| {
            assert!(previous.is_none());
            (Update::Put(value(1)), true)
        });
        assert!(inserted);

        store.update(key("a"), |previous| {
            assert_eq!(previous, Some(&value(1)));
            (Update::Keep, ())
        });
        assert_eq!(store.get(&key("a")).as_deref(), Some(&value(1)));

        store.update(key("a"), |_| (Update::Remove, ()));
        assert!(store.is_empty());

        // Removing or keeping a missing series leaves nothing behind.
        store.update(key("b"), |_| (Update::Remove, ()));
        store.update(key("b"), |_| (Update::Keep, ()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_for_each_and_retain() {
        let store = AggregationStore::new();
        for (idx, name) in ["a", "b", "c"].into_iter().enumerate() {
            store.put(key(name), value(idx as i64));
        }
        let mut seen = Vec::new();
        store.for_each(|k, _| seen.push(k.clone()));
        seen.sort();
        assert_eq!(seen, vec![key("a"), key("b"), key("c")]);

        store.retain(|k, _| k != &key("b"));
        assert_eq!(store.len(), 2);
        assert!(store.get(&key("b")).is_none());
    }
}
