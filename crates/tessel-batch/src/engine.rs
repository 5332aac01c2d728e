//! Seams to the collaborators the batch worker drives.
//!
//! The worker owns scheduling, cancellation and persistence. Point
//! placement, triangulation and color sampling are supplied from
//! outside through [`Engine`]; [`crate::grid`] provides a reference
//! implementation.

use std::sync::atomic::{AtomicBool, Ordering};

use image::RgbImage;
use tessel_mesh::{ColoredTriangle, Dimensions, NormPoint, Triangle};

use crate::config::BatchConfig;

/// A step-wise point optimizer.
pub trait Optimizer {
    /// Run one improvement step. Should return promptly; cancellation
    /// is only observed between steps.
    fn step(&mut self);

    /// The best point set found so far, in the unit square.
    fn best(&self) -> &[NormPoint];
}

/// Factory for the per-item collaborators.
pub trait Engine: Send + Sync + 'static {
    type Optimizer: Optimizer;

    /// Create an optimizer for `image` (already downsampled to the
    /// optimization size).
    fn optimizer(&self, image: &RgbImage, config: &BatchConfig) -> Self::Optimizer;

    /// Triangulate normalized points over a `dimensions`-sized image.
    fn triangulate(&self, points: &[NormPoint], dimensions: Dimensions) -> Vec<Triangle>;

    /// Assign each triangle the color it covers in `image`.
    fn render(&self, triangles: &[Triangle], image: &RgbImage) -> Vec<ColoredTriangle>;
}

/// Cooperative cancellation, polled once per optimizer step.
pub trait CancelSignal {
    fn is_cancelled(&self) -> bool;
}

impl CancelSignal for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

impl<F: Fn() -> bool> CancelSignal for F {
    fn is_cancelled(&self) -> bool {
        self()
    }
}
