//! TimeoutSweeper - Background service that expires abandoned payment intents.
//!
//! The provider does not always report on a checkout: users close the tab,
//! links expire silently, webhooks get lost. Any intent still pending after
//! the threshold is marked failed, its link cancelled at the provider, and
//! the user's previous entitlement restored.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 5 min | Time between sweeps |
//! | `threshold_minutes` | 30 | Age at which a pending intent times out |
//! | `batch_size` | 100 | Max intents handled per sweep |
//!
//! ## Graceful Shutdown
//!
//! The loop exits as soon as the shutdown channel flips to `true`. A sweep
//! already in progress finishes first.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::application::handlers::billing::{
    SweepPaymentTimeoutsCommand, SweepPaymentTimeoutsHandler, SweepResult,
};
use crate::domain::billing::BillingError;

#[derive(Debug, Clone)]
pub struct TimeoutSweeperConfig {
    /// Time between sweeps.
    pub interval: Duration,

    /// Pending intents older than this many minutes are timed out.
    pub threshold_minutes: i64,

    /// Maximum intents processed per sweep.
    pub batch_size: u32,
}

impl Default for TimeoutSweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            threshold_minutes: 30,
            batch_size: 100,
        }
    }
}

impl TimeoutSweeperConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_threshold_minutes(mut self, minutes: i64) -> Self {
        self.threshold_minutes = minutes;
        self
    }

    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }
}

pub struct TimeoutSweeper {
    handler: Arc<SweepPaymentTimeoutsHandler>,
    config: TimeoutSweeperConfig,
}

impl TimeoutSweeper {
    pub fn new(handler: Arc<SweepPaymentTimeoutsHandler>) -> Self {
        Self::with_config(handler, TimeoutSweeperConfig::default())
    }

    pub fn with_config(handler: Arc<SweepPaymentTimeoutsHandler>, config: TimeoutSweeperConfig) -> Self {
        Self { handler, config }
    }

    pub fn config(&self) -> &TimeoutSweeperConfig {
        &self.config
    }

    /// Run sweeps on the configured interval until shutdown is signalled.
    ///
    /// A failed sweep is logged and retried on the next tick; only the
    /// shutdown signal (or the sender being dropped) ends the loop.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            threshold_minutes = self.config.threshold_minutes,
            batch_size = self.config.batch_size,
            "Timeout sweeper started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Timeout sweeper stopping");
                        return;
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "Timeout sweep failed");
                    }
                }
            }
        }
    }

    /// Run exactly one sweep.
    pub async fn run_once(&self) -> Result<SweepResult, BillingError> {
        self.handler
            .handle(SweepPaymentTimeoutsCommand {
                threshold_minutes: self.config.threshold_minutes,
                batch_size: self.config.batch_size,
            })
            .await
    }
}
