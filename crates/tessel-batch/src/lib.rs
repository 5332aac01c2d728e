//! tessel-batch: background batch processing for tessel.
//!
//! Turns a queue of image files into `.tri` mesh files, one at a time,
//! on a single worker thread:
//!
//! - [`controller`]: the queue, run state machine and worker thread.
//! - [`pipeline`]: what the worker does with one item.
//! - [`driver`]: the time-boxed, cancellable optimization loop.
//! - [`engine`]: the seams to the optimizer, triangulator and renderer.
//! - [`grid`]: a self-contained reference [`Engine`].
//!
//! Progress is reported as [`Event`]s through an [`EventSink`].

pub mod clock;
pub mod config;
pub mod controller;
pub mod downsample;
pub mod driver;
pub mod engine;
pub mod event;
pub mod grid;
pub mod pipeline;

pub use clock::{Clock, StdClock};
pub use config::{BatchConfig, ConfigError};
pub use controller::{Controller, RemoveOutcome, RunState, StartError, StartOutcome};
pub use driver::{DriveLimits, DriveSummary, drive};
pub use engine::{CancelSignal, Engine, Optimizer};
pub use event::{Event, EventSink, ItemId};
pub use grid::{GridEngine, GridOptimizer, GridShape};
pub use pipeline::{ItemError, QueueItem, output_path, process_item};
