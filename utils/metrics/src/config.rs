use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::window::WindowParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Window used by counters created afterwards (default 15m / 1m)
    pub counter: WindowParams,
    /// Window used by histograms created afterwards (default 5m / 1m)
    pub histogram: WindowParams,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            counter: WindowParams {
                window: Duration::from_secs(15 * 60),
                bucket: Duration::from_secs(60),
            },
            histogram: WindowParams {
                window: Duration::from_secs(5 * 60),
                bucket: Duration::from_secs(60),
            },
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        self.counter.check()?;
        self.histogram.check()?;

        Ok(())
    }
}
