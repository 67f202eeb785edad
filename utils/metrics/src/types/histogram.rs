use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::types::bin_counter::BinCounter;
use crate::types::{BinBound, BinCount, Exponential, HistogramSnapshot, WindowedHistogram};
use crate::window::WindowParams;

/// A sliding-window histogram over an exponential bin scale.
///
/// ## Overview
///
/// Every update is mapped to a signed bin index by [`Exponential`] and counted
/// in a small per-bin ring of time buckets, so old observations age out of
/// the histogram the same way they age out of a
/// [`SlidingCounter`](crate::SlidingCounter).
///
/// ## Memory
///
/// Bins are created lazily the first time a value maps to them. The bin set
/// only grows up to the number of distinct indices ever seen, which is
/// bounded by `2 * Exponential::max_bin() + 1`. Each bin owns
/// `window / bucket` slots.
///
/// ## Ordering
///
/// Bins are kept in a `BTreeMap` keyed by index. Index order is value order by
/// construction, which is what the percentile pass in
/// [`HistogramSnapshot::percentiles`] relies on.
///
/// ## Example
///
/// ```rust
/// use std::time::Duration;
/// use windowed_metrics::Histogram;
///
/// let histogram = Histogram::new(Duration::from_secs(300), Duration::from_secs(60))
///     .expect("valid window");
///
/// histogram.update(12.5);
/// histogram.update(80.0);
///
/// let snapshot = histogram.snapshot();
/// let (values, count) = snapshot.percentiles(&[0.5, 0.99]);
/// assert_eq!(count, 2);
/// assert_eq!(values.len(), 2);
/// ```
#[derive(Debug)]
pub struct Histogram {
    clock: Arc<dyn Clock>,
    params: WindowParams,
    binner: Exponential,
    bins: RwLock<BTreeMap<i32, BinCounter>>,
}

impl Histogram {
    /// Creates a histogram reading the wall clock on every update.
    ///
    /// Use [`with_clock`](Self::with_clock) and a `CachedClock` to keep the
    /// update path at one atomic load when running inside tokio.
    pub fn new(window: Duration, bucket: Duration) -> Result<Self> {
        Self::with_clock(window, bucket, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(window: Duration, bucket: Duration, clock: Arc<dyn Clock>) -> Result<Self> {
        let params = WindowParams::new(window, bucket)?;

        Ok(Self::from_params(params, clock))
    }

    pub(crate) fn from_params(params: WindowParams, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            params,
            binner: Exponential::new(),
            bins: RwLock::new(BTreeMap::new()),
        }
    }

    /// Counts `value` in its bin. NaN is ignored.
    pub fn update(&self, value: f64) {
        if value.is_nan() {
            return;
        }

        let index = self.binner.bin(value);
        let mut bins = self.bins.write().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();

        bins.entry(index)
            .or_insert_with(|| BinCounter::new(self.params))
            .incr(now);
    }

    /// Live count of every known bin in ascending index order.
    pub fn snapshot(&self) -> HistogramSnapshot {
        let bins = self.bins.read().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();

        let counts = bins
            .iter()
            .map(|(&index, counter)| BinCount {
                index,
                count: counter.get(now),
            })
            .collect();

        HistogramSnapshot::new(self.binner, counts)
    }

    pub fn params(&self) -> WindowParams {
        self.params
    }
}

impl WindowedHistogram for Histogram {
    fn update(&self, value: f64) {
        Histogram::update(self, value);
    }

    fn snapshot(&self) -> HistogramSnapshot {
        Histogram::snapshot(self)
    }
}
