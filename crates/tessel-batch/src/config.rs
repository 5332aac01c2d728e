//! Batch run configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Parameters for one batch run.
///
/// Every item processed by a run uses the same configuration. The
/// configuration is captured when the run starts; changing it affects
/// only the next run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of points the optimizer places. Includes the four corners
    /// for the reference grid optimizer.
    pub point_count: usize,

    /// Optimization time per item in seconds. Zero or negative runs
    /// until the item is cancelled.
    pub time_budget_secs: f64,

    /// Longest side, in pixels, of the copy the optimizer works on.
    /// Zero optimizes at full resolution. The final mesh is always
    /// triangulated and rendered against the original image.
    pub max_dimension: u32,

    /// Minimum time between preview notifications, in seconds.
    pub preview_interval_secs: f64,

    /// Capacity of the pending-work channel. Enqueue blocks when full.
    pub queue_capacity: usize,

    /// Seed for the reference optimizer's random mutations.
    pub seed: u64,
}

impl BatchConfig {
    pub const DEFAULT_POINT_COUNT: usize = 600;
    pub const DEFAULT_TIME_BUDGET_SECS: f64 = 60.0;
    pub const DEFAULT_MAX_DIMENSION: u32 = 0;
    pub const DEFAULT_PREVIEW_INTERVAL_SECS: f64 = 1.0;
    pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
    pub const DEFAULT_SEED: u64 = 0;

    /// Smallest point count that still covers the image corners with
    /// at least two triangles.
    pub const MIN_POINT_COUNT: usize = 4;

    /// Check the invariants the worker relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.point_count < Self::MIN_POINT_COUNT {
            return Err(ConfigError::TooFewPoints {
                requested: self.point_count,
                min: Self::MIN_POINT_COUNT,
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if !self.preview_interval_secs.is_finite() || self.preview_interval_secs <= 0.0 {
            return Err(ConfigError::InvalidPreviewInterval(
                self.preview_interval_secs,
            ));
        }
        if self.time_budget_secs.is_nan() {
            return Err(ConfigError::InvalidTimeBudget);
        }
        Ok(())
    }

    /// The per-item deadline, or `None` when unbounded.
    #[must_use]
    pub fn time_budget(&self) -> Option<Duration> {
        if self.time_budget_secs > 0.0 {
            Duration::try_from_secs_f64(self.time_budget_secs).ok()
        } else {
            None
        }
    }

    /// The preview interval as a [`Duration`].
    ///
    /// Falls back to the default for values [`validate`](Self::validate)
    /// would reject.
    #[must_use]
    pub fn preview_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.preview_interval_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_secs(1))
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            point_count: Self::DEFAULT_POINT_COUNT,
            time_budget_secs: Self::DEFAULT_TIME_BUDGET_SECS,
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
            preview_interval_secs: Self::DEFAULT_PREVIEW_INTERVAL_SECS,
            queue_capacity: Self::DEFAULT_QUEUE_CAPACITY,
            seed: Self::DEFAULT_SEED,
        }
    }
}

/// A rejected [`BatchConfig`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("point count {requested} is below the minimum of {min}")]
    TooFewPoints { requested: usize, min: usize },

    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("preview interval must be a positive number of seconds, got {0}")]
    InvalidPreviewInterval(f64),

    #[error("time budget must be a number")]
    InvalidTimeBudget,
}
