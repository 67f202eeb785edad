use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::client::MetricSnapshot;
use crate::registry::Registry;
use crate::types::BucketStats;

/// Summary of one metric at the last collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub pkg: String,
    pub name: String,
    /// Every live bucket of the counter folded together.
    pub aggregate: BucketStats,
    /// `(fraction, value)` pairs; empty for counter-only metrics.
    pub percentiles: Vec<(f64, f64)>,
    /// Samples behind `percentiles`.
    pub samples: u64,
}

impl Report {
    fn new(snapshot: MetricSnapshot, fractions: &[f64]) -> Self {
        let aggregate = snapshot.counter.aggr_in(Duration::MAX);
        let (percentiles, samples) = match &snapshot.histogram {
            Some(histogram) => {
                let (values, samples) = histogram.percentiles(fractions);
                (fractions.iter().copied().zip(values).collect(), samples)
            }
            None => (Vec::new(), 0),
        };

        Self {
            pkg: snapshot.pkg,
            name: snapshot.name,
            aggregate,
            percentiles,
            samples,
        }
    }
}

/// Periodically snapshots every metric of a [`Registry`].
///
/// Reports are keyed by `pkg/name` and replaced on every tick. Metrics never
/// disappear from the report map once seen.
#[derive(Debug)]
pub struct Collector {
    reports: Arc<RwLock<BTreeMap<String, Report>>>,
    task: Option<JoinHandle<()>>,
}

impl Collector {
    /// Starts collecting immediately, then once per `interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(registry: Arc<Registry>, interval: Duration, fractions: Vec<f64>) -> Self {
        let mut s = Self {
            reports: Arc::new(RwLock::new(BTreeMap::new())),
            task: None,
        };

        s.task = Some(s.load(registry, interval, fractions));
        s
    }

    fn load(
        &self,
        registry: Arc<Registry>,
        interval: Duration,
        fractions: Vec<f64>,
    ) -> JoinHandle<()> {
        let reports = self.reports.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;

                let collected: Vec<Report> = registry
                    .snapshot("*", "*")
                    .into_iter()
                    .map(|snapshot| Report::new(snapshot, &fractions))
                    .collect();
                trace!(metrics = collected.len(), "collected metrics");

                let mut reports = reports.write().await;
                for report in collected {
                    reports.insert(format!("{}/{}", report.pkg, report.name), report);
                }
            }
        })
    }

    pub async fn reports(&self) -> BTreeMap<String, Report> {
        self.reports.read().await.clone()
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
