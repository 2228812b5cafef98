//! Entry transformation: one raw entry in, one output record or a
//! drop-signal out.
//!
//! The transform is a pure function of the entry, the image root, and the
//! run's source tag. It shares no mutable state, which is what lets the
//! runner apply it from a worker pool without coordination. Item-level
//! failures (missing fields, missing or unreadable image files) never
//! propagate: they become [`Outcome::Dropped`] and reduce yield instead of
//! aborting the run.

use crate::entry::{RawEntry, ShardRecord};
use anyhow::Result;
use std::fs;
use std::path::Path;

/// Why an entry was skipped. Inspectable for tests; the pipeline only
/// counts these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// `id`, `image`, or `conversations` is absent or empty.
    MissingField,
    /// The resolved image path does not exist.
    ImageNotFound,
    /// The image file exists but could not be read, or read to zero bytes.
    ImageUnreadable,
}

/// Result of transforming a single entry.
#[derive(Clone, Debug)]
pub enum Outcome {
    Transformed(ShardRecord),
    Dropped(DropReason),
}

impl Outcome {
    /// The record, if the entry survived.
    #[must_use]
    pub fn into_record(self) -> Option<ShardRecord> {
        match self {
            Self::Transformed(r) => Some(r),
            Self::Dropped(_) => None,
        }
    }
}

/// Transform one entry into a [`ShardRecord`], or signal a drop.
///
/// Steps: validate the three fields, resolve `image` against `image_root`,
/// require the file to exist, read its full byte payload, and serialize
/// `conversations` canonically. Any I/O failure past the existence check
/// maps to [`DropReason::ImageUnreadable`].
#[must_use]
pub fn transform_entry(entry: &RawEntry, image_root: &Path, source_tag: &str) -> Outcome {
    let (Some(idx), Some(rel), Some(conversations)) = (
        entry.id_text(),
        entry.image_path(),
        entry.conversations_value(),
    ) else {
        return Outcome::Dropped(DropReason::MissingField);
    };

    let full = image_root.join(rel);
    if !full.exists() {
        return Outcome::Dropped(DropReason::ImageNotFound);
    }

    match materialize(&full, conversations) {
        Ok((image, conversations)) => Outcome::Transformed(ShardRecord {
            idx,
            image,
            conversations,
            source: source_tag.to_string(),
        }),
        Err(_) => Outcome::Dropped(DropReason::ImageUnreadable),
    }
}

/// Read the image payload and serialize the dialogue. Fallible steps only;
/// the caller maps errors to a drop-signal.
fn materialize(image_path: &Path, conversations: &serde_json::Value) -> Result<(Vec<u8>, String)> {
    let image = fs::read(image_path)?;
    if image.is_empty() {
        anyhow::bail!("empty image payload at {}", image_path.display());
    }
    let conversations = serde_json::to_string(conversations)?;
    Ok((image, conversations))
}
