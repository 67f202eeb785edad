use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::types::{CounterSnapshot, WindowedCounter};
use crate::window::WindowParams;

/// Aggregated activity within one bucket-sized slice of time.
///
/// `end` is the exclusive upper bound of the slice in nanoseconds since the
/// Unix epoch. Bucket boundaries are aligned to whole multiples of the bucket
/// duration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeBucket {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub end: i64,
}

impl TimeBucket {
    fn accumulate(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn restart(&mut self, end: i64, value: f64) {
        self.end = end;
        self.count = 1;
        self.sum = value;
        self.min = value;
        self.max = value;
    }
}

#[derive(Debug)]
struct Ring {
    buckets: Vec<TimeBucket>,
    cursor: usize,
}

/// Sliding-window counter backed by a fixed ring of [`TimeBucket`]s.
///
/// The ring holds `window / bucket + 1` slots. Exactly one slot receives
/// writes at any time; advancing the cursor recycles the oldest slot once the
/// ring has wrapped. Slots skipped while the counter was idle are not cleared
/// on the write path: they keep a stale `end` and are dropped by the
/// liveness check in [`SlidingCounter::buckets`].
#[derive(Debug)]
pub struct SlidingCounter {
    clock: Arc<dyn Clock>,
    window: i64,
    bucket: i64,
    ring: RwLock<Ring>,
}

impl SlidingCounter {
    /// Creates a counter reading the wall clock directly.
    ///
    /// Every [`incr`](Self::incr) then pays for a wall-clock read. Inside a
    /// tokio runtime, pass a `CachedClock` to [`with_clock`](Self::with_clock)
    /// to get a single atomic load instead.
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
            window: params.window_nanos(),
            bucket: params.bucket_nanos(),
            ring: RwLock::new(Ring {
                buckets: vec![TimeBucket::default(); params.bucket_count() + 1],
                cursor: 0,
            }),
        }
    }

    /// Records one observation of `value`. NaN is ignored.
    pub fn incr(&self, value: f64) {
        if value.is_nan() {
            return;
        }

        let mut ring = self.ring.write().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();

        let cursor = ring.cursor;
        if now < ring.buckets[cursor].end {
            ring.buckets[cursor].accumulate(value);
            return;
        }

        let cursor = (cursor + 1) % ring.buckets.len();
        let end = now - now.rem_euclid(self.bucket) + self.bucket;
        ring.cursor = cursor;
        ring.buckets[cursor].restart(end, value);
    }

    /// Copies every bucket inside `(now - window, now]`, oldest first.
    ///
    /// The current bucket ends in the future and is therefore excluded until
    /// its interval closes.
    pub fn buckets(&self) -> Vec<TimeBucket> {
        self.live_buckets().1
    }

    /// Reads the clock under the ring lock so `now` never trails a write.
    fn live_buckets(&self) -> (i64, Vec<TimeBucket>) {
        let ring = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        let len = ring.buckets.len();

        let buckets = (1..=len)
            .map(|offset| ring.buckets[(ring.cursor + offset) % len])
            .filter(|b| b.end <= now && b.end.saturating_add(self.window) > now)
            .collect();

        (now, buckets)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let (now, buckets) = self.live_buckets();

        CounterSnapshot::new(self.bucket, now, buckets)
    }

    pub fn window(&self) -> Duration {
        Duration::from_nanos(self.window as u64)
    }

    pub fn bucket(&self) -> Duration {
        Duration::from_nanos(self.bucket as u64)
    }
}

impl WindowedCounter for SlidingCounter {
    fn incr(&self, value: f64) {
        SlidingCounter::incr(self, value);
    }

    fn snapshot(&self) -> CounterSnapshot {
        SlidingCounter::snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{OnceLock, Weak};
    use std::thread;

    const MINUTE: i64 = 60_000_000_000;
    // 2023-11-14T22:14:00Z, aligned to a whole minute
    const START: i64 = 1_700_000_040 * 1_000_000_000;

    fn counter(clock: &Arc<ManualClock>) -> SlidingCounter {
        SlidingCounter::with_clock(
            Duration::from_secs(3600),
            Duration::from_secs(60),
            clock.clone(),
        )
        .unwrap()
    }

    fn current(counter: &SlidingCounter) -> TimeBucket {
        let ring = counter.ring.read().unwrap();
        ring.buckets[ring.cursor]
    }

    /// Counts clock reads made while nobody holds the ring lock.
    #[derive(Debug, Default)]
    struct LockCheckingClock {
        counter: OnceLock<Weak<SlidingCounter>>,
        reads: AtomicUsize,
        unlocked_reads: AtomicUsize,
    }

    impl Clock for LockCheckingClock {
        fn now(&self) -> i64 {
            if let Some(counter) = self.counter.get().and_then(Weak::upgrade) {
                self.reads.fetch_add(1, Ordering::SeqCst);
                if counter.ring.try_write().is_ok() {
                    self.unlocked_reads.fetch_add(1, Ordering::SeqCst);
                }
            }
            START
        }
    }

    #[test]
    fn test_create_validates_params() {
        assert!(SlidingCounter::new(Duration::from_secs(60), Duration::from_secs(5)).is_ok());
        assert!(SlidingCounter::new(Duration::from_secs(10), Duration::from_secs(5)).is_err());
        assert!(SlidingCounter::new(Duration::from_secs(60), Duration::from_secs(1)).is_err());
        assert!(SlidingCounter::new(Duration::from_secs(60), Duration::from_secs(7)).is_err());
        assert!(SlidingCounter::new(Duration::from_secs(60), Duration::from_secs(300)).is_err());
    }

    #[test]
    fn test_ring_has_one_spare_slot() {
        let clock = Arc::new(ManualClock::new(START));
        let counter = counter(&clock);

        assert_eq!(counter.ring.read().unwrap().buckets.len(), 61);
        assert_eq!(counter.window(), Duration::from_secs(3600));
        assert_eq!(counter.bucket(), Duration::from_secs(60));
    }

    #[test]
    fn test_incr_within_one_bucket() {
        let clock = Arc::new(ManualClock::new(START + 5_000_000_000));
        let counter = counter(&clock);

        for _ in 0..7 {
            counter.incr(2.5);
            clock.advance(Duration::from_secs(1));
        }

        let bucket = current(&counter);
        assert_eq!(bucket.count, 7);
        assert_eq!(bucket.sum, 17.5);
        assert_eq!(bucket.min, 2.5);
        assert_eq!(bucket.max, 2.5);
        assert_eq!(bucket.end, START + MINUTE);
    }

    #[test]
    fn test_incr_ignores_nan() {
        let clock = Arc::new(ManualClock::new(START));
        let counter = counter(&clock);

        counter.incr(1.0);
        counter.incr(f64::NAN);

        let bucket = current(&counter);
        assert_eq!(bucket.count, 1);
        assert_eq!(bucket.sum, 1.0);
    }

    #[test]
    fn test_concurrent_incr() {
        let clock = Arc::new(ManualClock::new(START));
        let counter = Arc::new(counter(&clock));

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    counter.incr(3.0);
                    counter.buckets();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let bucket = current(&counter);
        assert_eq!(bucket.count, 100);
        assert_eq!(bucket.sum, 300.0);
    }

    #[test]
    fn test_buckets_cover_full_window_in_order() {
        let clock = Arc::new(ManualClock::new(START));
        let counter = counter(&clock);

        let mut end = START + MINUTE;
        let mut expected = Vec::new();
        for i in 0..60 {
            let m = (i + 1) as f64;
            counter.incr(m);
            counter.incr(4.0 * m);
            counter.incr(6.0 * m);
            clock.advance(Duration::from_secs(60));
            expected.push((end, m));
            end += MINUTE;
        }

        let buckets = counter.buckets();
        assert_eq!(buckets.len(), 60);
        for (bucket, (end, m)) in buckets.iter().zip(expected) {
            assert_eq!(bucket.end, end);
            assert_eq!(bucket.count, 3);
            assert_eq!(bucket.sum, 11.0 * m);
            assert_eq!(bucket.min, m);
            assert_eq!(bucket.max, 6.0 * m);
        }
    }

    #[test]
    fn test_buckets_expire_after_window() {
        let clock = Arc::new(ManualClock::new(START));
        let counter = counter(&clock);

        counter.incr(1.0);
        clock.advance(Duration::from_secs(60));
        assert_eq!(counter.buckets().len(), 1);

        clock.advance(Duration::from_secs(3540));
        assert_eq!(counter.buckets().len(), 1);

        clock.advance(Duration::from_secs(60));
        assert!(counter.buckets().is_empty());
    }

    #[test]
    fn test_skipped_buckets_are_not_resurrected() {
        let clock = Arc::new(ManualClock::new(START));
        let counter = counter(&clock);

        // fill the whole ring once
        for _ in 0..61 {
            counter.incr(1.0);
            clock.advance(Duration::from_secs(60));
        }

        // idle for half a window, then write once
        clock.advance(Duration::from_secs(1800));
        counter.incr(5.0);
        clock.advance(Duration::from_secs(60));

        let buckets = counter.buckets();
        let now = clock.now();
        assert!(buckets.iter().all(|b| b.end <= now && b.end + 60 * MINUTE > now));
        assert_eq!(buckets.last().map(|b| b.sum), Some(5.0));
        assert_eq!(buckets.iter().map(|b| b.count).sum::<u64>(), 30);
    }

    #[test]
    fn test_buckets_are_copies() {
        let clock = Arc::new(ManualClock::new(START));
        let counter = counter(&clock);

        counter.incr(1.0);
        clock.advance(Duration::from_secs(60));

        let mut copy = counter.buckets();
        copy[0].count = 8;

        assert_eq!(counter.buckets()[0].count, 1);
    }

    #[test]
    fn test_snapshot_matches_buckets() {
        let clock = Arc::new(ManualClock::new(START));
        let counter = counter(&clock);

        for v in [1.0, 2.0, 3.0] {
            counter.incr(v);
            clock.advance(Duration::from_secs(60));
        }

        let snapshot = counter.snapshot();
        assert_eq!(snapshot.buckets(), counter.buckets().as_slice());
        assert_eq!(snapshot.bucket_duration(), Duration::from_secs(60));
        assert_eq!(snapshot.taken_at(), clock.now());
    }

    #[test]
    fn test_clock_is_read_under_lock() {
        let clock = Arc::new(LockCheckingClock::default());
        let counter = Arc::new(
            SlidingCounter::with_clock(
                Duration::from_secs(3600),
                Duration::from_secs(60),
                clock.clone(),
            )
            .unwrap(),
        );
        clock.counter.set(Arc::downgrade(&counter)).unwrap();

        counter.incr(1.0);
        counter.incr(2.0);
        counter.buckets();
        counter.snapshot();

        assert_eq!(clock.reads.load(Ordering::SeqCst), 4);
        assert_eq!(clock.unlocked_reads.load(Ordering::SeqCst), 0);
    }
}
