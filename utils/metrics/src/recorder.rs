use std::sync::Arc;

use metrics::{Key, KeyName, Metadata, SharedString, Unit};

use crate::client::Client;

/// [`metrics::Recorder`] that records every facade call into a [`Client`].
///
/// | facade call | client call |
/// |---|---|
/// | `counter.increment(n)` | `bump_sum(n)` |
/// | `counter.absolute(n)` | `bump_avg(n)` |
/// | `gauge.set(v)` | `bump_avg(v)` |
/// | `gauge.increment(v)` / `decrement(v)` | `bump_sum(±v)` |
/// | `histogram.record(v)` | `bump_histogram(v)` |
///
/// Labelled keys are flattened to `name{label="value",...}`.
///
/// ```rust
/// use windowed_metrics::{Recorder, Registry};
///
/// let registry = Registry::new();
/// let recorder = Recorder::new(registry.client("app", ""));
///
/// metrics::with_local_recorder(&recorder, || {
///     metrics::histogram!("response_time", "route" => "/").record(45.2);
/// });
///
/// let names: Vec<_> = registry.snapshot("app", "*").into_iter().map(|s| s.name).collect();
/// assert_eq!(names, [r#"response_time{route="/"}"#]);
/// ```
#[derive(Debug, Clone)]
pub struct Recorder {
    client: Client,
}

impl Recorder {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Installs this recorder as the process-wide `metrics` recorder.
    pub fn install(self) -> Result<(), metrics::SetRecorderError<Self>> {
        metrics::set_global_recorder(self)
    }

    fn handle(&self, key: &Key) -> Arc<Handle> {
        Arc::new(Handle {
            client: self.client.clone(),
            key: crate::key::to_string(key),
        })
    }
}

#[derive(Debug)]
struct Handle {
    client: Client,
    key: String,
}

impl metrics::CounterFn for Handle {
    fn increment(&self, value: u64) {
        self.client.bump_sum(&self.key, value as f64);
    }

    fn absolute(&self, value: u64) {
        self.client.bump_avg(&self.key, value as f64);
    }
}

impl metrics::GaugeFn for Handle {
    fn increment(&self, value: f64) {
        self.client.bump_sum(&self.key, value);
    }

    fn decrement(&self, value: f64) {
        self.client.bump_sum(&self.key, -value);
    }

    fn set(&self, value: f64) {
        self.client.bump_avg(&self.key, value);
    }
}

impl metrics::HistogramFn for Handle {
    fn record(&self, value: f64) {
        self.client.bump_histogram(&self.key, value);
    }
}

impl metrics::Recorder for Recorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        //
    }

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        //
    }

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        //
    }

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> metrics::Counter {
        metrics::Counter::from_arc(self.handle(key))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> metrics::Gauge {
        metrics::Gauge::from_arc(self.handle(key))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> metrics::Histogram {
        metrics::Histogram::from_arc(self.handle(key))
    }
}
