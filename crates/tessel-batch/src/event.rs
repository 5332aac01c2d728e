//! Notifications emitted by the batch controller.
//!
//! Events are one-way and fire-and-forget: the worker never waits on a
//! consumer, and a sink whose receiver has gone away is not an error.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tessel_mesh::ColoredTriangle;

/// Identifier assigned to an enqueued item.
///
/// Ids are assigned in enqueue order, starting at 0, and the worker
/// processes items in ascending id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something observable happened in the batch controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A path was accepted into the queue.
    ItemAdded { id: ItemId, name: String },
    /// An item was removed by the caller (pruned or cancelled).
    ItemRemoved { id: ItemId },
    /// A worker was started.
    Running,
    /// The worker dequeued an item and began optimizing it.
    ItemStarted { id: ItemId },
    /// The current best mesh at the optimization resolution.
    Preview {
        id: ItemId,
        width: u32,
        height: u32,
        triangles: Vec<ColoredTriangle>,
    },
    /// Optimization time spent on the item so far.
    Elapsed { id: ItemId, seconds: f64 },
    /// The item's mesh was saved.
    ItemDone { id: ItemId, output: PathBuf },
    /// The item failed; the worker moves on to the next one.
    ItemErrored { id: ItemId, error: String },
    /// The worker exited and the controller is idle again.
    Stopped,
}

/// Destination for [`Event`]s.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: Event);
}

/// Pair with an unbounded channel; a bounded one would let a slow
/// consumer stall the worker.
impl EventSink for crossbeam_channel::Sender<Event> {
    fn emit(&self, event: Event) {
        if self.send(event).is_err() {
            tracing::trace!("event receiver disconnected");
        }
    }
}
