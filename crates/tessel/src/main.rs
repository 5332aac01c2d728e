//! tessel: turn a batch of images into `.tri` triangle-mesh files.
//!
//! Enqueues every given image (directories contribute their `.jpg`,
//! `.jpeg` and `.png` files), optimizes each one for a fixed time with
//! the reference grid engine, and writes `<name>.tri` next to the input.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin tessel -- [OPTIONS] <PATHS>...
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use clap::Parser;
use crossbeam_channel::{Receiver, Sender};
use tessel_batch::{BatchConfig, Controller, Event, GridEngine, RunState, StartError};
use tracing_subscriber::EnvFilter;

/// Batch image-to-triangle-mesh converter.
///
/// Each image is optimized for the configured time budget, then its
/// mesh is written beside it with a `.tri` extension.
#[derive(Parser)]
#[command(name = "tessel", version)]
struct Cli {
    /// Image files or directories of images.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Number of mesh points per image.
    #[arg(
        long,
        default_value_t = BatchConfig::DEFAULT_POINT_COUNT,
        value_parser = parse_point_count
    )]
    points: usize,

    /// Optimization time per image in seconds (0 = until interrupted).
    #[arg(long, default_value_t = BatchConfig::DEFAULT_TIME_BUDGET_SECS)]
    time: f64,

    /// Longest side of the optimization copy in pixels (0 = full size).
    #[arg(long, default_value_t = BatchConfig::DEFAULT_MAX_DIMENSION)]
    max_size: u32,

    /// Seconds between preview events.
    #[arg(long, default_value_t = BatchConfig::DEFAULT_PREVIEW_INTERVAL_SECS)]
    preview_interval: f64,

    /// Seed for the optimizer's random moves.
    #[arg(long, default_value_t = BatchConfig::DEFAULT_SEED)]
    seed: u64,

    /// Maximum number of queued images.
    #[arg(
        long,
        default_value_t = BatchConfig::DEFAULT_QUEUE_CAPACITY,
        value_parser = parse_queue_capacity
    )]
    queue_capacity: usize,

    /// Print every event as a JSON line on stdout.
    #[arg(long)]
    json: bool,

    /// Full batch config as a JSON string.
    ///
    /// When provided, all other config flags are ignored. Missing
    /// fields take their default values.
    #[arg(long)]
    config_json: Option<String>,
}

fn parse_at_least(s: &str, min: usize) -> Result<usize, String> {
    let value: usize = s.parse().map_err(|e| format!("{e}"))?;
    if value < min {
        return Err(format!("must be at least {min}"));
    }
    Ok(value)
}

fn parse_point_count(s: &str) -> Result<usize, String> {
    parse_at_least(s, BatchConfig::MIN_POINT_COUNT)
}

fn parse_queue_capacity(s: &str) -> Result<usize, String> {
    parse_at_least(s, 1)
}

/// Build a [`BatchConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Either way the result is
/// validated.
fn config_from_cli(cli: &Cli) -> Result<BatchConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        BatchConfig {
            point_count: cli.points,
            time_budget_secs: cli.time,
            max_dimension: cli.max_size,
            preview_interval_secs: cli.preview_interval,
            queue_capacity: cli.queue_capacity,
            seed: cli.seed,
        }
    };
    config
        .validate()
        .map_err(|e| format!("Invalid configuration: {e}"))?;
    Ok(config)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// One-line human summary of an event, or `None` for noisy ones.
fn describe(event: &Event) -> Option<String> {
    match event {
        Event::ItemAdded { id, name } => Some(format!("{id} queued: {name}")),
        Event::ItemStarted { id } => Some(format!("{id} started")),
        Event::ItemDone { id, output } => Some(format!("{id} saved {}", output.display())),
        Event::ItemErrored { id, error } => Some(format!("{id} failed: {error}")),
        Event::ItemRemoved { id } => Some(format!("{id} removed")),
        Event::Running | Event::Stopped | Event::Preview { .. } | Event::Elapsed { .. } => None,
    }
}

/// Outcome counts for one invocation.
#[derive(Debug, Default)]
struct Tally {
    saved: usize,
    failed: usize,
}

impl Tally {
    const fn finished(&self) -> usize {
        self.saved + self.failed
    }
}

fn report(event: &Event, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "cannot serialize event"),
        }
    } else if let Some(line) = describe(event) {
        eprintln!("{line}");
    }
}

/// Consume events until every enqueued item has finished.
///
/// Enqueueing runs concurrently on another thread and reports the
/// final item count through `enqueued`. The worker is (re)started
/// whenever it is idle with items waiting, which covers both the first
/// item arriving and a worker that drained the queue faster than the
/// paths were listed.
fn drain(
    controller: &Controller<GridEngine, Sender<Event>>,
    events: &Receiver<Event>,
    enqueued: Receiver<usize>,
    config: &BatchConfig,
    json: bool,
) -> Result<Tally, StartError> {
    let mut enqueued = enqueued;
    let mut expected = None;
    let mut tally = Tally::default();

    while expected.is_none_or(|n| tally.finished() < n) {
        crossbeam_channel::select! {
            recv(events) -> event => {
                let Ok(event) = event else { break };
                report(&event, json);
                match event {
                    Event::ItemAdded { .. } | Event::Stopped => {
                        if controller.state() == RunState::Idle && controller.pending() > 0 {
                            controller.start(config)?;
                        }
                    }
                    Event::ItemDone { .. } => tally.saved += 1,
                    Event::ItemErrored { .. } => tally.failed += 1,
                    _ => {}
                }
            }
            recv(enqueued) -> count => {
                expected = Some(count.unwrap_or(0));
                enqueued = crossbeam_channel::never();
            }
        }
    }
    Ok(tally)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(?config, "configuration");

    let (tx, rx) = crossbeam_channel::unbounded();
    let controller = Controller::new(GridEngine, tx, config.queue_capacity);

    // Enqueue on a second thread: a directory larger than the queue
    // blocks until the worker makes room.
    let result = thread::scope(|scope| {
        let (count_tx, count_rx) = crossbeam_channel::bounded(1);
        let controller = &controller;
        let paths = &cli.paths;
        scope.spawn(move || {
            let count = controller.enqueue_paths(paths).len();
            if count_tx.send(count).is_err() {
                tracing::debug!("event loop ended before enqueueing finished");
            }
        });
        drain(controller, &rx, count_rx, &config, cli.json)
    });
    controller.join();

    let tally = match result {
        Ok(tally) => tally,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if tally.finished() == 0 {
        eprintln!("No images found in the given paths");
        return ExitCode::FAILURE;
    }

    eprintln!("{} saved, {} failed", tally.saved, tally.failed);
    if tally.failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
