//! Processing of a single queue item.
//!
//! Read → decode → downsample → optimize → triangulate and render at
//! full size → encode → write `<stem>.tri` next to the input.
//!
//! Every failure is confined to the item: the caller reports it and
//! moves on.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tessel_export::{EncodeError, encode_tri};
use tessel_mesh::Dimensions;

use crate::clock::StdClock;
use crate::config::BatchConfig;
use crate::downsample::downsample;
use crate::driver::{DriveLimits, drive};
use crate::engine::{CancelSignal, Engine, Optimizer};
use crate::event::{Event, EventSink, ItemId};

/// Extension of the files written by [`process_item`].
pub const OUTPUT_EXTENSION: &str = "tri";

/// One image waiting to be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub id: ItemId,
    pub path: PathBuf,
}

/// Why an item could not be turned into a mesh file.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    /// The input file could not be opened or read.
    #[error("cannot read {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The input bytes are not an image in a supported format.
    #[error("cannot decode {}: {source}", path.display())]
    DecodeFailure {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The output file could not be created or written.
    #[error("cannot write {}: {source}", path.display())]
    SinkUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The optimized mesh could not be encoded.
    #[error("cannot encode mesh for {}: {source}", path.display())]
    Mesh {
        path: PathBuf,
        #[source]
        source: EncodeError,
    },
}

/// Where the mesh for `input` is written: same directory and stem,
/// `.tri` extension.
#[must_use]
pub fn output_path(input: &Path) -> PathBuf {
    input.with_extension(OUTPUT_EXTENSION)
}

fn dimensions_of(image: &RgbImage) -> Dimensions {
    Dimensions::new(image.width(), image.height())
}

/// Optimize one image and save its mesh.
///
/// Previews and elapsed time go to `events`; the caller emits the
/// item's start/done/error notifications. The final best point set is
/// saved even when `cancel` fires before the budget runs out.
///
/// # Errors
///
/// Returns an [`ItemError`] describing the first failed step. A write
/// failure removes whatever part of the output file was created.
#[tracing::instrument(skip_all, fields(id = %item.id, path = %item.path.display()))]
pub fn process_item<E, S, K>(
    engine: &E,
    item: &QueueItem,
    config: &BatchConfig,
    cancel: &S,
    events: &K,
) -> Result<PathBuf, ItemError>
where
    E: Engine,
    S: CancelSignal + ?Sized,
    K: EventSink + ?Sized,
{
    let bytes = fs::read(&item.path).map_err(|source| ItemError::SourceUnreadable {
        path: item.path.clone(),
        source,
    })?;
    let decoded = image::load_from_memory(&bytes).map_err(|source| ItemError::DecodeFailure {
        path: item.path.clone(),
        source,
    })?;
    let original = decoded.to_rgb8();
    let working = downsample(&decoded, config.max_dimension).map(|image| image.to_rgb8());
    let working = working.as_ref().unwrap_or(&original);
    tracing::debug!(
        width = original.width(),
        height = original.height(),
        working_width = working.width(),
        working_height = working.height(),
        "decoded",
    );

    let mut optimizer = engine.optimizer(working, config);
    let working_dimensions = dimensions_of(working);
    let summary = drive(
        &mut optimizer,
        &DriveLimits::from_config(config),
        cancel,
        &StdClock,
        |best, elapsed| {
            let triangles = engine.triangulate(best, working_dimensions);
            events.emit(Event::Preview {
                id: item.id,
                width: working_dimensions.width,
                height: working_dimensions.height,
                triangles: engine.render(&triangles, working),
            });
            events.emit(Event::Elapsed {
                id: item.id,
                seconds: elapsed.as_secs_f64(),
            });
        },
    );
    events.emit(Event::Elapsed {
        id: item.id,
        seconds: summary.elapsed.as_secs_f64(),
    });

    let dimensions = dimensions_of(&original);
    let triangles = engine.triangulate(optimizer.best(), dimensions);
    let colored = engine.render(&triangles, &original);
    let encoded = encode_tri(dimensions, &colored).map_err(|source| ItemError::Mesh {
        path: item.path.clone(),
        source,
    })?;

    let output = output_path(&item.path);
    write_output(&output, &encoded)?;
    tracing::info!(
        steps = summary.steps,
        seconds = summary.elapsed.as_secs_f64(),
        cancelled = summary.cancelled,
        triangles = colored.len(),
        bytes = encoded.len(),
        output = %output.display(),
        "saved mesh",
    );
    Ok(output)
}

/// Write `bytes` to `path`, deleting the file again if the write fails.
fn write_output(path: &Path, bytes: &[u8]) -> Result<(), ItemError> {
    fs::write(path, bytes).map_err(|source| {
        if let Err(e) = fs::remove_file(path)
            && e.kind() != io::ErrorKind::NotFound
        {
            tracing::warn!(path = %path.display(), error = %e, "could not remove partial output");
        }
        ItemError::SinkUnwritable {
            path: path.to_path_buf(),
            source,
        }
    })
}
