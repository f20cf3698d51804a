// Retention Sweeper
// Periodic eviction of jobs past their maximum age

use crate::application::constants::{DEFAULT_MAX_JOB_AGE, DEFAULT_SWEEP_INTERVAL};
use crate::application::registry::JobRegistry;
use crate::application::shutdown::ShutdownToken;
use crate::error::{AppError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

/// Sweep timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Pause between passes
    pub interval: Duration,
    /// Jobs older than this are evicted
    pub max_age: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
            max_age: DEFAULT_MAX_JOB_AGE,
        }
    }
}

impl RetentionConfig {
    /// The interval must be non-zero and shorter than the max age,
    /// otherwise eviction latency is no longer bounded by one interval.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(AppError::Config(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        if self.interval >= self.max_age {
            return Err(AppError::Config(format!(
                "sweep interval ({}s) must be shorter than max job age ({}s)",
                self.interval.as_secs(),
                self.max_age.as_secs()
            )));
        }
        Ok(())
    }
}

/// Retention sweeper
///
/// Should be spawned in tokio::spawn; stops when the shutdown token fires.
pub struct RetentionSweeper {
    registry: Arc<JobRegistry>,
    config: RetentionConfig,
}

impl RetentionSweeper {
    pub fn new(registry: Arc<JobRegistry>, config: RetentionConfig) -> Self {
        Self { registry, config }
    }

    /// Sweep loop. The first pass happens one interval after start.
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            max_age_secs = self.config.max_age.as_secs(),
            "Retention sweeper started"
        );

        let mut tick = interval_at(Instant::now() + self.config.interval, self.config.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.wait() => break,
            }

            // Each pass runs in its own task so a panicking pass cannot end the loop
            let registry = Arc::clone(&self.registry);
            let max_age = self.config.max_age;
            let pass = tokio::spawn(async move { sweep(&registry, max_age).await });
            if let Err(e) = pass.await {
                error!(error = %e, "Retention pass aborted, continuing");
            }
        }

        info!("Retention sweeper stopped");
    }

    /// Single eviction pass, returns how many jobs were removed
    pub async fn run_once(&self) -> usize {
        sweep(&self.registry, self.config.max_age).await
    }
}

async fn sweep(registry: &JobRegistry, max_age: Duration) -> usize {
    let evicted = registry.evict_older_than(max_age).await;
    if evicted > 0 {
        info!(evicted, "Evicted expired jobs");
    }
    evicted
}
