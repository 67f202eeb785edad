use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::client::{Client, DefaultFactory, MetricFactory, MetricSnapshot, Package, Shared};
#[cfg(feature = "ticker")]
use crate::clock::CachedClock;
use crate::clock::{Clock, SystemClock};
use crate::config::MetricsConfig;
use crate::error::Result;
use crate::window::WindowParams;

/// Owns every package's metrics and the window parameters new metrics get.
///
/// Changing parameters only affects metrics created afterwards; existing
/// counters and histograms keep the window they were built with.
#[derive(Debug)]
pub struct Registry {
    shared: Arc<Shared>,
    packages: DashMap<String, Arc<Package>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates a registry whose metrics read the wall clock on every update.
    ///
    /// This works outside any async runtime. Services running on tokio should
    /// prefer `Registry::cached`, which turns each clock read on the update
    /// path into a single atomic load.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Creates a registry backed by a [`CachedClock`] refreshed once per
    /// second.
    ///
    /// Must be called from within a tokio runtime.
    #[cfg(feature = "ticker")]
    pub fn cached() -> Self {
        Self::with_clock(Arc::new(CachedClock::spawn()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let factory = Arc::new(DefaultFactory::new(clock.clone()));

        Self::with_factory(clock, factory)
    }

    pub fn with_factory(clock: Arc<dyn Clock>, factory: Arc<dyn MetricFactory>) -> Self {
        Self {
            shared: Arc::new(Shared::new(clock, factory)),
            packages: DashMap::new(),
        }
    }

    /// Builds a registry with validated starting parameters.
    pub fn from_config(config: MetricsConfig) -> Result<Self> {
        let registry = Self::new();
        registry.configure(config)?;

        Ok(registry)
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.shared.clock.clone()
    }

    pub fn config(&self) -> MetricsConfig {
        self.shared.config()
    }

    /// Replaces both parameter sets after validating them.
    pub fn configure(&self, config: MetricsConfig) -> Result<()> {
        if let Err(e) = config.validate() {
            warn!(error = %e, "rejected metrics config");
            return Err(e);
        }

        self.shared.update_config(|current| *current = config);
        info!(
            counter_window = ?config.counter.window,
            counter_bucket = ?config.counter.bucket,
            histogram_window = ?config.histogram.window,
            histogram_bucket = ?config.histogram.bucket,
            "metrics config applied"
        );

        Ok(())
    }

    pub fn set_counter_params(&self, window: Duration, bucket: Duration) -> Result<()> {
        let params = Self::validated(window, bucket)?;

        self.shared.update_config(|config| config.counter = params);
        info!(?window, ?bucket, "counter params changed");

        Ok(())
    }

    pub fn set_histogram_params(&self, window: Duration, bucket: Duration) -> Result<()> {
        let params = Self::validated(window, bucket)?;

        self.shared.update_config(|config| config.histogram = params);
        info!(?window, ?bucket, "histogram params changed");

        Ok(())
    }

    fn validated(window: Duration, bucket: Duration) -> Result<WindowParams> {
        WindowParams::new(window, bucket).inspect_err(|e| {
            warn!(?window, ?bucket, error = %e, "rejected window params");
        })
    }

    /// Returns a client for `pkg`, creating the package on first use.
    ///
    /// A non-empty `prefix` is prepended to every key the client records,
    /// joined with a `.`.
    pub fn client(&self, pkg: &str, prefix: &str) -> Client {
        let package = self
            .packages
            .entry(pkg.to_owned())
            .or_insert_with(|| {
                debug!(pkg, "package created");
                Arc::new(Package::new(pkg, self.shared.clone()))
            })
            .value()
            .clone();

        Client::new(package, prefix)
    }

    /// Snapshots of metrics whose package contains `qpkg` and whose name
    /// contains `qname`. Either query may be `"*"` to match everything.
    ///
    /// Results are sorted by package, then by name.
    pub fn snapshot(&self, qpkg: &str, qname: &str) -> Vec<MetricSnapshot> {
        let mut packages = self.matching(|name| qpkg == "*" || name.contains(qpkg));
        packages.sort_by(|a, b| a.name().cmp(b.name()));

        packages.iter().flat_map(|p| p.get(qname)).collect()
    }

    /// Sorted package names. Packages without metrics are listed only when
    /// `show_empty` is set.
    pub fn packages(&self, show_empty: bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .matching(|_| true)
            .into_iter()
            .filter(|p| show_empty || p.len() > 0)
            .map(|p| p.name().to_owned())
            .collect();
        names.sort();

        names
    }

    fn matching(&self, pred: impl Fn(&str) -> bool) -> Vec<Arc<Package>> {
        self.packages
            .iter()
            .filter(|entry| pred(entry.key()))
            .map(|entry| entry.value().clone())
            .collect()
    }
}
