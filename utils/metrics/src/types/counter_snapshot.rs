use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::TimeBucket;
use crate::window::nanos;

/// Statistics of one bucket, or of several buckets folded together.
///
/// An aggregate with `count == 0` and both timestamps at the Unix epoch means
/// "no data" rather than an observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BucketStats {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Default for BucketStats {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: 0.0,
            max: 0.0,
            avg: 0.0,
            start: DateTime::from_timestamp_nanos(0),
            end: DateTime::from_timestamp_nanos(0),
        }
    }
}

fn avg(sum: f64, count: u64) -> f64 {
    if count > 0 { sum / count as f64 } else { 0.0 }
}

/// Point-in-time copy of a counter's live buckets.
///
/// Holds no reference to the counter it came from. Sub-window queries are
/// measured back from the moment the snapshot was taken, so repeated queries
/// on one snapshot always agree.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterSnapshot {
    bucket: i64,
    taken_at: i64,
    buckets: Vec<TimeBucket>,
}

impl CounterSnapshot {
    pub(crate) fn new(bucket: i64, taken_at: i64, buckets: Vec<TimeBucket>) -> Self {
        Self {
            bucket,
            taken_at,
            buckets,
        }
    }

    /// Captured buckets, oldest first.
    pub fn buckets(&self) -> &[TimeBucket] {
        &self.buckets
    }

    pub fn bucket_duration(&self) -> Duration {
        Duration::from_nanos(self.bucket as u64)
    }

    /// Capture time in nanoseconds since the Unix epoch.
    pub fn taken_at(&self) -> i64 {
        self.taken_at
    }

    fn within(&self, duration: Duration) -> impl Iterator<Item = &TimeBucket> + '_ {
        let lower = self.taken_at.saturating_sub(nanos(duration));

        self.buckets.iter().filter(move |b| b.end >= lower)
    }

    /// Per-bucket statistics for buckets ending within `duration` of the
    /// capture time, in stored order.
    pub fn slice_in(&self, duration: Duration) -> Vec<BucketStats> {
        self.within(duration)
            .map(|b| BucketStats {
                count: b.count,
                sum: b.sum,
                min: b.min,
                max: b.max,
                avg: avg(b.sum, b.count),
                start: DateTime::from_timestamp_nanos(b.end - self.bucket),
                end: DateTime::from_timestamp_nanos(b.end),
            })
            .collect()
    }

    /// Statistics of every bucket ending within `duration` folded into one.
    pub fn aggr_in(&self, duration: Duration) -> BucketStats {
        let mut count = 0u64;
        let mut sum = 0.0;
        let mut min = 0.0;
        let mut max = 0.0;
        let mut first_end = i64::MAX;
        let mut last_end = i64::MIN;

        for b in self.within(duration) {
            if count > 0 {
                min = b.min.min(min);
                max = b.max.max(max);
            } else {
                min = b.min;
                max = b.max;
            }
            count += b.count;
            sum += b.sum;
            first_end = first_end.min(b.end);
            last_end = last_end.max(b.end);
        }

        if first_end > last_end {
            return BucketStats::default();
        }

        BucketStats {
            count,
            sum,
            min,
            max,
            avg: avg(sum, count),
            start: DateTime::from_timestamp_nanos(first_end - self.bucket),
            end: DateTime::from_timestamp_nanos(last_end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: i64 = 60_000_000_000;
    const NOW: i64 = 1_700_000_040 * 1_000_000_000;

    fn bucket(end: i64, count: u64, sum: f64, min: f64, max: f64) -> TimeBucket {
        TimeBucket {
            count,
            sum,
            min,
            max,
            end,
        }
    }

    fn snapshot() -> CounterSnapshot {
        CounterSnapshot::new(
            MINUTE,
            NOW,
            vec![
                bucket(NOW, 10, 20.0, 2.0, 8.0),
                bucket(NOW - MINUTE, 20, 70.0, 7.0, 12.0),
                bucket(NOW - 2 * MINUTE, 30, 70.0, 6.0, 11.0),
            ],
        )
    }

    fn at(nanos: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(nanos)
    }

    #[test]
    fn test_slice_in() {
        let slice = snapshot().slice_in(Duration::from_secs(60));

        assert_eq!(
            slice,
            vec![
                BucketStats {
                    count: 10,
                    sum: 20.0,
                    min: 2.0,
                    max: 8.0,
                    avg: 2.0,
                    start: at(NOW - MINUTE),
                    end: at(NOW),
                },
                BucketStats {
                    count: 20,
                    sum: 70.0,
                    min: 7.0,
                    max: 12.0,
                    avg: 3.5,
                    start: at(NOW - 2 * MINUTE),
                    end: at(NOW - MINUTE),
                },
            ]
        );
    }

    #[test]
    fn test_aggr_in() {
        let aggr = snapshot().aggr_in(Duration::from_secs(60));

        assert_eq!(
            aggr,
            BucketStats {
                count: 30,
                sum: 90.0,
                min: 2.0,
                max: 12.0,
                avg: 3.0,
                start: at(NOW - 2 * MINUTE),
                end: at(NOW),
            }
        );
    }

    #[test]
    fn test_aggr_in_equals_folded_slice() {
        let snapshot = snapshot();
        let window = Duration::from_secs(3600);

        let slice = snapshot.slice_in(window);
        let aggr = snapshot.aggr_in(window);

        assert_eq!(slice.len(), 3);
        assert_eq!(aggr.count, slice.iter().map(|b| b.count).sum::<u64>());
        assert_eq!(aggr.sum, slice.iter().map(|b| b.sum).sum::<f64>());
        assert_eq!(aggr.min, 2.0);
        assert_eq!(aggr.max, 12.0);
        assert_eq!(aggr.start, at(NOW - 3 * MINUTE));
    }

    #[test]
    fn test_aggr_in_without_buckets_is_zero() {
        let empty = CounterSnapshot::new(MINUTE, NOW, Vec::new());
        assert_eq!(empty.aggr_in(Duration::from_secs(3600)), BucketStats::default());
        assert!(empty.slice_in(Duration::from_secs(3600)).is_empty());

        // nothing within the requested duration
        let stale = CounterSnapshot::new(MINUTE, NOW, vec![bucket(NOW - 10 * MINUTE, 1, 1.0, 1.0, 1.0)]);
        let aggr = stale.aggr_in(Duration::from_secs(60));
        assert_eq!(aggr.count, 0);
        assert_eq!(aggr.start, at(0));
        assert_eq!(aggr.end, at(0));
    }

    #[test]
    fn test_slice_in_zero_duration_keeps_current_boundary() {
        let slice = snapshot().slice_in(Duration::ZERO);

        assert_eq!(slice.len(), 1);
        assert_eq!(slice[0].end, at(NOW));
    }
}
