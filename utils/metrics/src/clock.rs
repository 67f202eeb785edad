//! Time sources read on every hot-path operation.
//!
//! All clocks report nanoseconds since the Unix epoch as an `i64` and never
//! go backwards from a caller's point of view.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[cfg(feature = "ticker")]
use std::sync::Arc;

#[cfg(feature = "ticker")]
use tokio::task::JoinHandle;

pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in nanoseconds since the Unix epoch.
    fn now(&self) -> i64;
}

fn wall_clock_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(crate::window::nanos)
        .unwrap_or(0)
}

/// Reads the wall clock on every call.
///
/// Readings are clamped so a wall-clock step backwards is never observed.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        let now = wall_clock_nanos();
        let prev = self.last.fetch_max(now, Ordering::Relaxed);

        prev.max(now)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            nanos: AtomicI64::new(start),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.nanos
            .fetch_add(crate::window::nanos(duration), Ordering::Relaxed);
    }

    pub fn set(&self, nanos: i64) {
        self.nanos.store(nanos, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.nanos.load(Ordering::Relaxed)
    }
}

/// Wall clock cached in an atomic and refreshed by a background tokio task.
///
/// `now()` is a single relaxed load. Readings lag the wall clock by at most
/// one refresh interval. The refresher is aborted when the clock is dropped.
#[cfg(feature = "ticker")]
#[derive(Debug)]
pub struct CachedClock {
    nanos: Arc<AtomicI64>,
    task: Option<JoinHandle<()>>,
}

#[cfg(feature = "ticker")]
impl CachedClock {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    /// Starts a clock refreshed once per second.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn() -> Self {
        Self::with_interval(Self::DEFAULT_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        let mut clock = Self {
            nanos: Arc::new(AtomicI64::new(wall_clock_nanos())),
            task: None,
        };

        clock.task = Some(clock.refresh(interval));
        clock
    }

    fn refresh(&self, interval: Duration) -> JoinHandle<()> {
        let nanos = self.nanos.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;
                nanos.fetch_max(wall_clock_nanos(), Ordering::Relaxed);
            }
        })
    }
}

#[cfg(feature = "ticker")]
impl Clock for CachedClock {
    fn now(&self) -> i64 {
        self.nanos.load(Ordering::Relaxed)
    }
}

#[cfg(feature = "ticker")]
impl Drop for CachedClock {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance_and_set() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), 1_000);

        clock.advance(Duration::from_nanos(500));
        assert_eq!(clock.now(), 1_500);

        clock.set(42);
        assert_eq!(clock.now(), 42);
    }

    #[test]
    fn test_system_clock_is_non_decreasing() {
        let clock = SystemClock::new();
        let mut prev = clock.now();
        assert!(prev > 0);

        for _ in 0..1000 {
            let now = clock.now();
            assert!(now >= prev);
            prev = now;
        }
    }

    #[test]
    fn test_system_clock_ignores_backward_steps() {
        let clock = SystemClock::new();
        clock.last.store(i64::MAX - 1, Ordering::Relaxed);

        assert_eq!(clock.now(), i64::MAX - 1);
    }

    #[cfg(feature = "ticker")]
    #[tokio::test(start_paused = true)]
    async fn test_cached_clock_refreshes() {
        let clock = CachedClock::spawn();
        let first = clock.now();
        assert!(first > 0);

        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(clock.now() >= first);
    }

    #[cfg(feature = "ticker")]
    #[tokio::test(start_paused = true)]
    async fn test_cached_clock_stops_on_drop() {
        let clock = CachedClock::with_interval(Duration::from_millis(100));
        let nanos = clock.nanos.clone();
        drop(clock);

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(Arc::strong_count(&nanos), 1);
    }
}
