//! Sampling by how often a trace's span path was seen recently.
//!
//! A trace's path is the sequence of its span names ordered by end time. Paths are
//! counted in two overlapping windows; the current window is replaced by the next
//! one every half period, so a path is counted over between half and one period.

use std::{
    collections::HashMap,
    mem,
    sync::{Arc, Weak},
    time::Duration,
};

use opentelemetry_proto::tonic::trace::v1::ResourceSpans;
use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use xxhash_rust::xxh3::Xxh3;

use crate::{Decision, Error};

const DEFAULT_PERIOD: Duration = Duration::from_secs(30);
const DEFAULT_FREQUENCY: u64 = 1;

/// Unique trace path policy configuration.
#[derive(Debug, Clone)]
pub struct UniqueTracePathConfig {
    /// Length of the counting window.
    pub period: Duration,
    /// How many traces with the same path are sampled per window.
    pub frequency: u64,
}

impl UniqueTracePathConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if (self.period / 2).is_zero() {
            return Err(Error::InvalidPeriod);
        }
        if self.frequency == 0 {
            return Err(Error::InvalidFrequency);
        }
        Ok(())
    }
}

impl Default for UniqueTracePathConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            frequency: DEFAULT_FREQUENCY,
        }
    }
}

/// Samples a trace while its path was seen at most `frequency` times in the window.
pub struct UniqueTracePathFilter {
    period: Duration,
    frequency: u64,
    /// Path counts for the `[current, next]` windows.
    counters: Mutex<[HashMap<u64, u64>; 2]>,
}

impl UniqueTracePathFilter {
    pub fn new(config: &UniqueTracePathConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            period: config.period,
            frequency: config.frequency,
            counters: Mutex::new([HashMap::new(), HashMap::new()]),
        })
    }

    /// Counts the trace's path and decides whether to keep the trace.
    pub fn evaluate(&self, trace: &[ResourceSpans]) -> Decision {
        let count = self.count(trace_path_id(trace));
        if count <= self.frequency {
            Decision::Sampled
        } else {
            Decision::NotSampled
        }
    }

    fn count(&self, path: u64) -> u64 {
        let mut counters = self.counters.lock();
        *counters[1].entry(path).or_default() += 1;
        let current = counters[0].entry(path).or_default();
        *current += 1;
        *current
    }

    /// Makes the next window current and starts a new, empty next window.
    pub fn rotate(&self) {
        let mut counters = self.counters.lock();
        let size = counters[0].len();
        counters[0] = mem::replace(&mut counters[1], HashMap::with_capacity(size));
    }

    /// Spawns a task rotating the windows every half period.
    ///
    /// The task stops once the filter is dropped.
    pub fn spawn_rotation(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let filter: Weak<Self> = Arc::downgrade(self);
        let half_period = self.period / 2;
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + half_period, half_period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let Some(strong) = filter.upgrade() else {
                    break;
                };
                strong.rotate();
            }
            tracing::debug!("trace path filter dropped, stopping rotation");
        })
    }
}

/// Hashes span names ordered by end time.
fn trace_path_id(trace: &[ResourceSpans]) -> u64 {
    let mut spans: Vec<(u64, &str)> = trace
        .iter()
        .flat_map(|rs| &rs.scope_spans)
        .flat_map(|ss| &ss.spans)
        .map(|span| (span.end_time_unix_nano, span.name.as_str()))
        .collect();
    // Stable, spans ending together keep their received order.
    spans.sort_by_key(|(end, _)| *end);
    let mut hasher = Xxh3::new();
    for (_, name) in spans {
        hasher.update(name.as_bytes());
    }
    hasher.digest()
}
