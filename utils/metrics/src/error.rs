use std::time::Duration;

use thiserror::Error;

/// Rejected window/bucket configuration.
///
/// Raised synchronously by constructors and parameter setters. Nothing is
/// built when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid window duration {window:?}: must be at least one minute")]
    WindowTooShort { window: Duration },

    #[error("invalid bucket duration {bucket:?}: must be at least two seconds")]
    BucketTooShort { bucket: Duration },

    #[error("invalid bucket duration {bucket:?}: not a whole number of seconds")]
    FractionalBucket { bucket: Duration },

    #[error("invalid pair {window:?}:{bucket:?}: window is shorter than bucket")]
    WindowShorterThanBucket { window: Duration, bucket: Duration },

    #[error("indivisible window/bucket pair {window:?}:{bucket:?}")]
    IndivisibleWindow { window: Duration, bucket: Duration },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
