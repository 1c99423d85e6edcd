//! Accumulation of pushed OTLP metrics into a pull-model snapshot.
//!
//! An [`Accumulator`] takes OTLP `ResourceMetrics` batches, which may arrive out of
//! order, twice, or from many writers at once, and keeps a single current value per
//! timeseries. Gauges, histograms and summaries keep their latest datapoint; sums
//! are always exposed as cumulative, converting monotonic deltas by adding them
//! onto the stored total. [`Accumulator::collect`] returns every live series and
//! prunes the ones that were not updated within the configured expiration.
//!
//! Nothing in accumulation is fatal: unsupported or semantically invalid metrics
//! are skipped with a diagnostic and the rest of the batch is processed.

mod accumulator;
mod config;
mod error;
pub mod merge;
pub mod series_key;
pub mod store;
#[cfg(test)]
mod test_utils;

pub use accumulator::{Accumulator, Collected};
pub use config::AccumulatorConfig;
pub use error::Error;
pub use series_key::{ResourceLabels, SeriesKey};
pub use store::{AccumulatedValue, AggregationStore, ResourceAttributes};
