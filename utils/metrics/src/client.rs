use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::MetricsConfig;
use crate::error::Result;
use crate::types::{
    CounterSnapshot, Histogram, HistogramSnapshot, SlidingCounter, WindowedCounter,
    WindowedHistogram,
};
use crate::window::WindowParams;

/// Builds the metrics a [`Client`] creates on demand.
pub trait MetricFactory: Send + Sync + fmt::Debug {
    fn new_counter(&self, params: WindowParams) -> Result<Arc<dyn WindowedCounter>>;

    fn new_histogram(&self, params: WindowParams) -> Result<Arc<dyn WindowedHistogram>>;
}

/// Builds [`SlidingCounter`]s and [`Histogram`]s that share one clock.
#[derive(Debug, Clone)]
pub struct DefaultFactory {
    clock: Arc<dyn Clock>,
}

impl DefaultFactory {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Default for DefaultFactory {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock::new()))
    }
}

impl MetricFactory for DefaultFactory {
    fn new_counter(&self, params: WindowParams) -> Result<Arc<dyn WindowedCounter>> {
        params.check()?;

        Ok(Arc::new(SlidingCounter::from_params(params, self.clock.clone())))
    }

    fn new_histogram(&self, params: WindowParams) -> Result<Arc<dyn WindowedHistogram>> {
        params.check()?;

        Ok(Arc::new(Histogram::from_params(params, self.clock.clone())))
    }
}

/// State shared by a registry and every client it hands out.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) factory: Arc<dyn MetricFactory>,
    config: RwLock<MetricsConfig>,
}

impl Shared {
    pub(crate) fn new(clock: Arc<dyn Clock>, factory: Arc<dyn MetricFactory>) -> Self {
        Self {
            clock,
            factory,
            config: RwLock::new(MetricsConfig::default()),
        }
    }

    pub(crate) fn config(&self) -> MetricsConfig {
        *self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn update_config(&self, f: impl FnOnce(&mut MetricsConfig)) {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *config);
    }
}

#[derive(Debug, Clone)]
struct Pair {
    counter: Arc<dyn WindowedCounter>,
    histogram: Option<Arc<dyn WindowedHistogram>>,
}

impl Pair {
    fn satisfies(&self, histogram: bool) -> bool {
        !histogram || self.histogram.is_some()
    }
}

/// Counters and histograms of one package, keyed by full metric name.
#[derive(Debug)]
pub(crate) struct Package {
    name: String,
    shared: Arc<Shared>,
    pairs: DashMap<String, Pair>,
}

impl Package {
    pub(crate) fn new(name: &str, shared: Arc<Shared>) -> Self {
        Self {
            name: name.to_owned(),
            shared,
            pairs: DashMap::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns the pair for `name`, creating the counter and, when asked, the
    /// histogram. An existing counter-only pair is upgraded in place.
    ///
    /// `None` when the factory refused to build a metric.
    fn ensure(&self, name: &str, histogram: bool) -> Option<Pair> {
        if let Some(pair) = self.pairs.get(name) {
            if pair.satisfies(histogram) {
                return Some(pair.value().clone());
            }
        }

        let config = self.shared.config();

        // another writer may have filled the slot since the lookup above
        match self.pairs.entry(name.to_owned()) {
            Entry::Occupied(mut entry) => {
                let pair = entry.get_mut();
                if !pair.satisfies(histogram) {
                    pair.histogram = Some(self.new_histogram(name, config.histogram)?);
                }
                Some(pair.clone())
            }
            Entry::Vacant(entry) => {
                let counter = self.new_counter(name, config.counter)?;
                let histogram = if histogram {
                    Some(self.new_histogram(name, config.histogram)?)
                } else {
                    None
                };

                Some(entry.insert(Pair { counter, histogram }).value().clone())
            }
        }
    }

    fn new_counter(&self, name: &str, params: WindowParams) -> Option<Arc<dyn WindowedCounter>> {
        match self.shared.factory.new_counter(params) {
            Ok(counter) => {
                debug!(pkg = %self.name, name, window = ?params.window, bucket = ?params.bucket, "counter created");
                Some(counter)
            }
            Err(e) => {
                warn!(pkg = %self.name, name, error = %e, "failed to create counter");
                None
            }
        }
    }

    fn new_histogram(
        &self,
        name: &str,
        params: WindowParams,
    ) -> Option<Arc<dyn WindowedHistogram>> {
        match self.shared.factory.new_histogram(params) {
            Ok(histogram) => {
                debug!(pkg = %self.name, name, window = ?params.window, bucket = ?params.bucket, "histogram created");
                Some(histogram)
            }
            Err(e) => {
                warn!(pkg = %self.name, name, error = %e, "failed to create histogram");
                None
            }
        }
    }

    /// Snapshots of every pair whose name contains `qname`, or of all pairs
    /// for `"*"`, sorted by name.
    pub(crate) fn get(&self, qname: &str) -> Vec<MetricSnapshot> {
        let mut pairs: Vec<(String, Pair)> = self
            .pairs
            .iter()
            .filter(|entry| qname == "*" || entry.key().contains(qname))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        pairs
            .into_iter()
            .map(|(name, pair)| MetricSnapshot {
                pkg: self.name.clone(),
                name,
                counter: pair.counter.snapshot(),
                histogram: pair.histogram.as_ref().map(|h| h.snapshot()),
            })
            .collect()
    }
}

/// Handle for recording metrics into one package.
///
/// Cheap to clone. Every key is prepended with the handle's prefix before it
/// reaches the package, so two clients of the same package with different
/// prefixes never collide.
///
/// ```rust
/// use windowed_metrics::Registry;
///
/// let registry = Registry::new();
/// let client = registry.client("http", "server");
///
/// client.bump_sum("requests", 1.0);
/// client.bump_histogram("latency_ms", 12.0);
///
/// let names: Vec<_> = client.get("*").into_iter().map(|s| s.name).collect();
/// assert_eq!(names, ["server.latency_ms", "server.requests"]);
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    package: Arc<Package>,
    prefix: String,
}

impl Client {
    pub(crate) fn new(package: Arc<Package>, prefix: &str) -> Self {
        let mut prefix = prefix.to_owned();
        if !prefix.is_empty() && !prefix.ends_with('.') {
            prefix.push('.');
        }

        Self { package, prefix }
    }

    pub fn pkg(&self) -> &str {
        self.package.name()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn qualify(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn bump_avg(&self, key: &str, value: f64) {
        self.bump_sum(key, value);
    }

    pub fn bump_sum(&self, key: &str, value: f64) {
        if let Some(pair) = self.package.ensure(&self.qualify(key), false) {
            pair.counter.incr(value);
        }
    }

    /// Records `value` in both the counter and the histogram of `key`.
    pub fn bump_histogram(&self, key: &str, value: f64) {
        if let Some(pair) = self.package.ensure(&self.qualify(key), true) {
            pair.counter.incr(value);
            if let Some(histogram) = pair.histogram {
                histogram.update(value);
            }
        }
    }

    /// Starts timing `key`. The elapsed nanoseconds are recorded through
    /// [`Client::bump_histogram`] when the timer ends or is dropped.
    pub fn bump_time(&self, key: &str) -> Timer {
        Timer {
            client: self.clone(),
            key: key.to_owned(),
            start: self.package.shared.clock.now(),
            done: false,
        }
    }

    /// Snapshots of this client's package matching `qname` (`"*"` for all).
    pub fn get(&self, qname: &str) -> Vec<MetricSnapshot> {
        self.package.get(qname)
    }
}

/// Pending duration measurement returned by [`Client::bump_time`].
#[derive(Debug)]
#[must_use = "a timer records when it ends or is dropped"]
pub struct Timer {
    client: Client,
    key: String,
    start: i64,
    done: bool,
}

impl Timer {
    pub fn end(mut self) {
        self.record();
    }

    fn record(&mut self) {
        if self.done {
            return;
        }
        self.done = true;

        let elapsed = self.client.package.shared.clock.now() - self.start;
        self.client.bump_histogram(&self.key, elapsed as f64);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.record();
    }
}

/// Counter and optional histogram state of one named metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    pub pkg: String,
    pub name: String,
    pub counter: CounterSnapshot,
    pub histogram: Option<HistogramSnapshot>,
}

impl MetricSnapshot {
    pub fn has_histogram(&self) -> bool {
        self.histogram.is_some()
    }
}
