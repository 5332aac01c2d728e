//! The optimization loop.
//!
//! [`drive`] steps an [`Optimizer`] until its item is cancelled or its
//! time budget runs out, handing out previews of the current best point
//! set along the way. It never fails: whatever the optimizer holds when
//! the loop ends is the result, including after cancellation.

use std::time::Duration;

use tessel_mesh::NormPoint;

use crate::clock::Clock;
use crate::config::BatchConfig;
use crate::engine::{CancelSignal, Optimizer};

/// Bounds on one item's optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveLimits {
    /// `None` runs until cancelled.
    pub budget: Option<Duration>,
    /// Minimum time between previews.
    pub preview_interval: Duration,
}

impl DriveLimits {
    #[must_use]
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            budget: config.time_budget(),
            preview_interval: config.preview_interval(),
        }
    }
}

/// What happened during a [`drive`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveSummary {
    /// Number of completed optimizer steps.
    pub steps: u64,
    /// Time spent in the loop.
    pub elapsed: Duration,
    /// `true` if the loop ended because `cancel` fired.
    pub cancelled: bool,
}

/// Step `optimizer` until cancelled or out of time.
///
/// Each iteration checks `cancel`, then the budget, then whether a
/// preview is due, and finally steps. A preview is due once elapsed
/// time strictly exceeds the preview mark, which starts at zero and is
/// moved to `elapsed + interval` after each preview; the first preview
/// therefore follows the first step.
pub fn drive<O, S, C, F>(
    optimizer: &mut O,
    limits: &DriveLimits,
    cancel: &S,
    clock: &C,
    mut on_preview: F,
) -> DriveSummary
where
    O: Optimizer + ?Sized,
    S: CancelSignal + ?Sized,
    C: Clock,
    F: FnMut(&[NormPoint], Duration),
{
    let start = clock.now();
    let mut elapsed = Duration::ZERO;
    let mut next_preview = Duration::ZERO;
    let mut steps = 0;

    let cancelled = loop {
        if cancel.is_cancelled() {
            break true;
        }
        if limits.budget.is_some_and(|budget| elapsed >= budget) {
            break false;
        }
        if elapsed > next_preview {
            on_preview(optimizer.best(), elapsed);
            next_preview = elapsed + limits.preview_interval;
        }

        optimizer.step();
        steps += 1;
        elapsed = clock.elapsed(&start);
    };

    DriveSummary {
        steps,
        elapsed,
        cancelled,
    }
}
