//! The batch queue and its single background worker.
//!
//! Items are enqueued from the foreground into a bounded channel and
//! drained by at most one worker thread, strictly one item at a time in
//! ascending id order. All run and cancellation state lives in one
//! [`ControlState`] behind one mutex; the worker reads it once per
//! optimizer step and at every dequeue.
//!
//! ```text
//!            start (queue non-empty)
//!   Idle ───────────────────────────▶ Running
//!    ▲                                 │  │
//!    │ queue drained                   │  │ remove_item(current)
//!    │ or stop observed                │  ▼
//!    │                  start          │ StoppingCurrent ──(next item)──▶ Running
//!    └──────────── StoppingAll ◀───────┘  │
//!                        ▲                │ start
//!                        └────────────────┘
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::config::{BatchConfig, ConfigError};
use crate::engine::Engine;
use crate::event::{Event, EventSink, ItemId};
use crate::pipeline::{QueueItem, process_item};

/// File extensions picked up when a directory is enqueued.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Lifecycle of the background worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No worker is active.
    Idle,
    /// The worker is draining the queue.
    Running,
    /// The in-flight item should stop optimizing; the run continues.
    StoppingCurrent,
    /// The in-flight item should stop and nothing else be dequeued.
    StoppingAll,
}

/// Result of [`Controller::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A worker was spawned.
    Started,
    /// The queue was empty; nothing happened.
    NothingQueued,
    /// A run was already active and has been asked to stop.
    StopRequested,
}

/// Result of [`Controller::remove_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The item is being processed; its optimization was cut short and
    /// its current best is still saved.
    CancelledCurrent,
    /// The item is still queued and will be skipped.
    Pruned,
    /// The item was already dequeued; nothing changed.
    AlreadyProcessed,
    /// No item with this id has been enqueued; nothing changed.
    Unknown,
}

/// Why a run could not be started.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("invalid batch configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Everything the worker and the foreground must agree on.
#[derive(Debug)]
struct ControlState {
    run: RunState,
    /// Item being processed right now.
    current: Option<ItemId>,
    /// Highest id dequeued so far, processed or skipped.
    cursor: Option<ItemId>,
    /// Queued ids to skip when they reach the front.
    removed: BTreeSet<ItemId>,
}

/// Enqueue side. Id assignment and send happen under one lock so ids
/// enter the channel in ascending order.
struct Intake {
    next_id: u64,
    sender: Sender<QueueItem>,
}

struct Shared<E, K> {
    engine: E,
    events: K,
    control: Mutex<ControlState>,
    intake: Mutex<Intake>,
    /// Number of ids handed out; every id below it has been enqueued.
    assigned: AtomicU64,
    receiver: Receiver<QueueItem>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<E: Engine, K: EventSink> Shared<E, K> {
    fn run_state(&self) -> RunState {
        lock(&self.control).run
    }

    /// Dequeue the next item to process, skipping removed ones.
    ///
    /// When there is nothing left to do the controller goes back to
    /// [`RunState::Idle`] in the same critical section, so a concurrent
    /// [`Controller::start`] either sees the old worker still running or
    /// may spawn a new one.
    fn next_item(&self) -> Option<QueueItem> {
        let mut control = lock(&self.control);
        control.current = None;
        while control.run != RunState::StoppingAll {
            let Ok(item) = self.receiver.try_recv() else {
                break;
            };
            control.cursor = Some(item.id);
            if control.removed.remove(&item.id) {
                tracing::debug!(id = %item.id, "skipping removed item");
                continue;
            }
            control.current = Some(item.id);
            control.run = RunState::Running;
            return Some(item);
        }
        control.run = RunState::Idle;
        self.events.emit(Event::Stopped);
        None
    }

    fn work(&self, config: &BatchConfig) {
        while let Some(item) = self.next_item() {
            self.events.emit(Event::ItemStarted { id: item.id });
            let cancel = || self.run_state() != RunState::Running;
            match process_item(&self.engine, &item, config, &cancel, &self.events) {
                Ok(output) => self.events.emit(Event::ItemDone {
                    id: item.id,
                    output,
                }),
                Err(e) => {
                    tracing::warn!(id = %item.id, error = %e, "item failed");
                    self.events.emit(Event::ItemErrored {
                        id: item.id,
                        error: e.to_string(),
                    });
                }
            }
        }
        tracing::info!("worker stopped");
    }
}

/// Owns the queue, the control state and the worker thread.
pub struct Controller<E: Engine, K: EventSink> {
    shared: Arc<Shared<E, K>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<E: Engine, K: EventSink> Controller<E, K> {
    /// Create an idle controller whose queue holds up to
    /// `queue_capacity` items (at least one).
    pub fn new(engine: E, events: K, queue_capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(queue_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                engine,
                events,
                control: Mutex::new(ControlState {
                    run: RunState::Idle,
                    current: None,
                    cursor: None,
                    removed: BTreeSet::new(),
                }),
                intake: Mutex::new(Intake { next_id: 0, sender }),
                assigned: AtomicU64::new(0),
                receiver,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Current run state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.shared.run_state()
    }

    /// Id of the item being processed, if any.
    #[must_use]
    pub fn current(&self) -> Option<ItemId> {
        lock(&self.shared.control).current
    }

    /// Number of items waiting in the channel, including removed ones
    /// not yet skipped.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.receiver.len()
    }

    /// Enqueue a file, or every image file directly inside a directory.
    ///
    /// Directory entries are filtered to [`IMAGE_EXTENSIONS`]
    /// (case-insensitive) and enqueued in file-name order. A path that
    /// does not exist or cannot be listed is logged and skipped. Blocks
    /// while the queue is full.
    pub fn enqueue_path(&self, path: impl AsRef<Path>) -> Vec<ItemId> {
        let path = path.as_ref();
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring invalid path");
                return Vec::new();
            }
        };

        if !metadata.is_dir() {
            return self.enqueue_file(path.to_path_buf()).into_iter().collect();
        }

        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot list directory");
                return Vec::new();
            }
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && has_image_extension(p))
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        tracing::debug!(path = %path.display(), count = files.len(), "enqueueing directory");
        files
            .into_iter()
            .filter_map(|file| self.enqueue_file(file))
            .collect()
    }

    /// [`enqueue_path`](Self::enqueue_path) for each path in turn.
    pub fn enqueue_paths<I, P>(&self, paths: I) -> Vec<ItemId>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths
            .into_iter()
            .flat_map(|path| self.enqueue_path(path))
            .collect()
    }

    fn enqueue_file(&self, path: PathBuf) -> Option<ItemId> {
        let mut intake = lock(&self.shared.intake);
        let id = ItemId(intake.next_id);
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        if intake.sender.send(QueueItem { id, path }).is_err() {
            tracing::error!(%id, "queue receiver is gone");
            return None;
        }
        intake.next_id += 1;
        self.shared.assigned.store(intake.next_id, Ordering::Release);
        self.shared.events.emit(Event::ItemAdded { id, name });
        Some(id)
    }

    /// Start a run, or stop the active one.
    ///
    /// When idle, spawns a worker that processes the queue with
    /// `config`. When a run is active, asks it to abandon the current
    /// item and stop dequeuing; the current item's best result is still
    /// saved.
    ///
    /// # Errors
    ///
    /// [`StartError::InvalidConfig`] if `config` does not validate (only
    /// checked when a run would be started), or [`StartError::Spawn`] if
    /// the worker thread could not be created.
    pub fn start(&self, config: &BatchConfig) -> Result<StartOutcome, StartError> {
        {
            let mut control = lock(&self.shared.control);
            match control.run {
                RunState::Running | RunState::StoppingCurrent | RunState::StoppingAll => {
                    control.run = RunState::StoppingAll;
                    tracing::info!("stop requested");
                    return Ok(StartOutcome::StopRequested);
                }
                RunState::Idle => {}
            }
            if self.shared.receiver.is_empty() {
                return Ok(StartOutcome::NothingQueued);
            }
            config.validate()?;
            control.run = RunState::Running;
            self.shared.events.emit(Event::Running);
        }

        let mut worker = lock(&self.worker);
        if let Some(previous) = worker.take() {
            join_worker(previous);
        }
        let shared = Arc::clone(&self.shared);
        let config = config.clone();
        let spawned = thread::Builder::new()
            .name("tessel-worker".into())
            .spawn(move || shared.work(&config));
        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                tracing::info!(pending = self.pending(), "run started");
                Ok(StartOutcome::Started)
            }
            Err(e) => {
                lock(&self.shared.control).run = RunState::Idle;
                self.shared.events.emit(Event::Stopped);
                Err(StartError::Spawn(e))
            }
        }
    }

    /// Remove an item from the run.
    ///
    /// The in-flight item is cancelled (its current best is still
    /// saved and no [`Event::ItemRemoved`] is sent for it). A queued
    /// item is marked to be skipped when it reaches the front. An item
    /// that was already dequeued is reported removed even though nothing
    /// changes. An id that was never handed out is ignored.
    pub fn remove_item(&self, id: ItemId) -> RemoveOutcome {
        if id.0 >= self.shared.assigned.load(Ordering::Acquire) {
            tracing::debug!(%id, "ignoring removal of unknown item");
            return RemoveOutcome::Unknown;
        }
        let mut control = lock(&self.shared.control);
        if control.current == Some(id) && control.run != RunState::Idle {
            if control.run == RunState::Running {
                control.run = RunState::StoppingCurrent;
            }
            tracing::info!(%id, "cancelling current item");
            return RemoveOutcome::CancelledCurrent;
        }

        let outcome = if control.cursor.is_none_or(|cursor| id > cursor) {
            control.removed.insert(id);
            RemoveOutcome::Pruned
        } else {
            RemoveOutcome::AlreadyProcessed
        };
        drop(control);
        self.shared.events.emit(Event::ItemRemoved { id });
        outcome
    }

    /// Wait for the active worker, if any, to finish.
    pub fn join(&self) {
        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            join_worker(handle);
        }
    }
}

impl<E: Engine, K: EventSink> Drop for Controller<E, K> {
    fn drop(&mut self) {
        {
            let mut control = lock(&self.shared.control);
            if control.run != RunState::Idle {
                control.run = RunState::StoppingAll;
            }
        }
        self.join();
    }
}

fn join_worker(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        tracing::error!("worker thread panicked");
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}
