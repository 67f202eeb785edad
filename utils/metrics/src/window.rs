use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

const MIN_WINDOW: Duration = Duration::from_secs(60);
const MIN_BUCKET: Duration = Duration::from_secs(2);

/// Validates a (window, bucket) pair shared by counters and histograms.
///
/// Rules are checked in order and the first violation is returned:
/// window of at least one minute, bucket of at least two seconds, bucket a
/// whole number of seconds, window no shorter than bucket, and window an
/// exact multiple of bucket.
pub fn check(window: Duration, bucket: Duration) -> Result<()> {
    if window < MIN_WINDOW {
        return Err(ConfigError::WindowTooShort { window });
    }
    if bucket < MIN_BUCKET {
        return Err(ConfigError::BucketTooShort { bucket });
    }
    if bucket.subsec_nanos() != 0 {
        return Err(ConfigError::FractionalBucket { bucket });
    }
    if window < bucket {
        return Err(ConfigError::WindowShorterThanBucket { window, bucket });
    }
    if window.as_nanos() % bucket.as_nanos() != 0 {
        return Err(ConfigError::IndivisibleWindow { window, bucket });
    }

    Ok(())
}

/// A validated window/bucket pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowParams {
    pub window: Duration,
    pub bucket: Duration,
}

impl WindowParams {
    pub fn new(window: Duration, bucket: Duration) -> Result<Self> {
        check(window, bucket)?;

        Ok(Self { window, bucket })
    }

    /// Re-runs validation, for params that arrived through deserialization.
    pub fn check(&self) -> Result<()> {
        check(self.window, self.bucket)
    }

    /// Number of buckets that make up one window.
    pub fn bucket_count(&self) -> usize {
        (self.window.as_nanos() / self.bucket.as_nanos()) as usize
    }

    pub(crate) fn window_nanos(&self) -> i64 {
        nanos(self.window)
    }

    pub(crate) fn bucket_nanos(&self) -> i64 {
        nanos(self.bucket)
    }
}

pub(crate) fn nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}
