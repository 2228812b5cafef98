//! Dataset filtering and down-sampling ahead of conversion.
//!
//! This stage is pure pre-processing over full JSON records: exclude
//! records whose `image` path contains a substring (historically
//! `ocr_vqa`), then optionally down-sample the remainder to a target count
//! with [`sample_records`](crate::sampler::sample_records). Input accepts
//! the same JSON-array / JSON-Lines forms as the conversion pipeline;
//! output is always a pretty-printed JSON array.

use crate::reader::ValueReader;
use crate::sampler::sample_records;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Load a full dataset into memory as raw JSON records.
///
/// # Errors
/// Fails on a missing file, a non-array top level, or a malformed JSONL
/// line.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<Value>> {
    ValueReader::open(path)?.collect()
}

/// Drop records whose `image` field contains `needle`.
///
/// Records without an `image` field, or with a non-string one, are kept.
#[must_use]
pub fn filter_records(records: Vec<Value>, needle: &str) -> Vec<Value> {
    records
        .into_iter()
        .filter(|r| {
            !r.get("image")
                .and_then(Value::as_str)
                .is_some_and(|p| p.contains(needle))
        })
        .collect()
}

/// Write records as a pretty-printed JSON array, creating parent
/// directories as needed.
///
/// # Errors
/// Fails if the file or directories cannot be created or written.
pub fn write_records_json(path: impl AsRef<Path>, records: &[Value]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, records)
        .with_context(|| format!("serialize records to {}", path.display()))?;
    w.flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

/// Filter by substring exclusion, then down-sample when the survivor count
/// exceeds `num_samples`. Returns the number of records written.
///
/// # Errors
/// Fails on unreadable input, a non-array top level, or an unwritable
/// output path.
pub fn run_filter(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    needle: &str,
    num_samples: usize,
    seed: u64,
) -> Result<usize> {
    let records = load_records(&input)?;
    info!(loaded = records.len(), "records loaded");

    let filtered = filter_records(records, needle);
    info!(remaining = filtered.len(), needle, "filtering complete");

    let selected = if filtered.len() > num_samples {
        let s = sample_records(filtered, num_samples, seed);
        info!(sampled = s.len(), "down-sampled filtered records");
        s
    } else {
        info!(total = filtered.len(), "at or under target, keeping all");
        filtered
    };

    write_records_json(&output, &selected)?;
    Ok(selected.len())
}

/// Uniformly sample `count` records from the input dataset. Returns the
/// number of records written.
///
/// # Errors
/// Same failure modes as [`run_filter`].
pub fn run_sample(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    count: usize,
    seed: u64,
) -> Result<usize> {
    let records = load_records(&input)?;
    info!(loaded = records.len(), "records loaded");

    let selected = sample_records(records, count, seed);
    info!(sampled = selected.len(), "sampling complete");

    write_records_json(&output, &selected)?;
    Ok(selected.len())
}
