//! Timeout sweeper configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

const MAX_BATCH_SIZE: u32 = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    /// Run the background sweeper; the admin endpoint works either way
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Age in minutes after which a pending payment is timed out
    #[serde(default = "default_threshold_minutes")]
    pub threshold_minutes: i64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl SweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::InvalidSweepInterval);
        }
        if self.threshold_minutes <= 0 {
            return Err(ValidationError::InvalidTimeoutThreshold);
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ValidationError::InvalidBatchSize);
        }
        Ok(())
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
            threshold_minutes: default_threshold_minutes(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    300
}

fn default_threshold_minutes() -> i64 {
    30
}

fn default_batch_size() -> u32 {
    100
}
