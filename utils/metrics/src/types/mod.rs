use std::fmt;

pub(crate) mod bin_counter;
mod counter;
mod counter_snapshot;
pub mod exponential;
mod hist_snapshot;
mod histogram;

pub use counter::{SlidingCounter, TimeBucket};
pub use counter_snapshot::{BucketStats, CounterSnapshot};
pub use exponential::{BinBound, Exponential, MAX_VALUE, MIN_FLOAT_VALUE, MIN_VALUE, STEP};
pub use hist_snapshot::{Bin, BinCount, HistogramSnapshot, percentiles};
pub use histogram::Histogram;

/// Windowed statistics over a stream of values.
pub trait WindowedCounter: Send + Sync + fmt::Debug {
    fn incr(&self, value: f64);

    fn snapshot(&self) -> CounterSnapshot;
}

/// Windowed value distribution over a stream of values.
pub trait WindowedHistogram: Send + Sync + fmt::Debug {
    fn update(&self, value: f64);

    fn snapshot(&self) -> HistogramSnapshot;
}
