//! # Windowed Metrics
//!
//! Sliding-window counters and exponential histograms with percentile
//! estimation.
//!
//! ## Overview
//!
//! A [`SlidingCounter`] keeps count, sum, min and max per fixed-size time
//! bucket over a trailing window. A [`Histogram`] maps every value onto a
//! logarithmic bin scale and keeps a count-only sliding window per bin, so
//! percentiles always describe the recent past rather than the whole process
//! lifetime. Both are safe to share across threads and both hand out
//! immutable snapshots for reporting.
//!
//! ## Features
//!
//! - **Sliding windows**: observations age out one bucket at a time
//! - **Exponential bins**: ten bins per decade from `1e-6` to `1e10`, mirrored for negatives
//! - **Percentiles**: linear interpolation inside the bin holding the requested rank
//! - **Per-package clients**: metrics created on first use and grouped by package
//! - **`metrics` facade**: [`Recorder`] routes `counter!`, `gauge!` and `histogram!` calls
//! - **Pluggable time**: inject any [`Clock`], including a cached one refreshed by tokio
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use windowed_metrics::Registry;
//!
//! let registry = Registry::new();
//! registry
//!     .set_histogram_params(Duration::from_secs(600), Duration::from_secs(60))
//!     .expect("valid window");
//!
//! let client = registry.client("http", "");
//! client.bump_histogram("latency_ms", 42.0);
//! client.bump_histogram("latency_ms", 7.5);
//!
//! for snapshot in registry.snapshot("http", "latency") {
//!     let histogram = snapshot.histogram.expect("histogram was bumped");
//!     let (values, count) = histogram.percentiles(&[0.5, 0.99]);
//!     assert_eq!(count, 2);
//!     assert_eq!(values.len(), 2);
//! }
//! ```
//!
//! ## Window Parameters
//!
//! Every window must be at least one minute, every bucket at least two whole
//! seconds, and the window an exact multiple of the bucket. Violations are
//! reported as [`ConfigError`] and nothing is built.
//!
//! ## Snapshots
//!
//! Counter snapshots only contain closed buckets: activity in the bucket that
//! is still being written shows up once its interval ends. Histogram snapshots
//! count everything inside the window, including the current bucket.
//!
//! ## Feature Flags
//!
//! - `ticker` (default): [`CachedClock`], a tokio-refreshed wall clock
//! - `collector` (default): [`Collector`], periodic reports over a [`Registry`]

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod registry;
pub mod types;
pub mod window;

#[cfg(feature = "collector")]
pub mod collector;

pub(crate) mod key;
pub(crate) mod recorder;

pub use client::{Client, DefaultFactory, MetricFactory, MetricSnapshot, Timer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MetricsConfig;
pub use error::{ConfigError, Result};
pub use recorder::Recorder;
pub use registry::Registry;
pub use types::{
    Bin, BinBound, BinCount, BucketStats, CounterSnapshot, Exponential, Histogram,
    HistogramSnapshot, SlidingCounter, TimeBucket, WindowedCounter, WindowedHistogram,
};
pub use window::{WindowParams, check};

#[cfg(feature = "ticker")]
pub use clock::CachedClock;

#[cfg(feature = "collector")]
pub use collector::{Collector, Report};
