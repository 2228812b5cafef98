//! Top-level conversion driver: JSON metadata + image tree → Parquet shards.
//!
//! Wires the record reader through the parallel transformer into the shard
//! writer, then runs the best-effort rename pass. The coordinating thread
//! owns the writer and the output directory; workers only transform.
//! Lifecycle: read → (transform | drop) per entry → batch → flush → rotate
//! → finalize → rename. A failed run restarts from scratch.

use crate::par_map::{DEFAULT_WORKER_CAP, ParMap, default_workers};
use crate::reader::EntryReader;
use crate::rename::finalize_shard_names;
use crate::transform::{Outcome, transform_entry};
use crate::writer::{SHARD_EXT, ShardWriter, ShardWriterOptions};
use anyhow::Result;
use indicatif::ProgressBar;
use std::path::PathBuf;
use tracing::{info, warn};

/// Everything `run_convert` needs to know.
#[derive(Clone, Debug)]
pub struct ConvertOptions {
    /// JSON array or JSONL metadata file.
    pub input: PathBuf,
    /// Root directory the entries' relative image paths resolve against.
    pub image_root: PathBuf,
    /// Destination directory for Parquet shards (created if absent).
    pub out_dir: PathBuf,
    /// Constant `source` tag stamped on every output record.
    pub source_tag: String,
    /// Rows per shard file.
    pub records_per_shard: usize,
    /// Buffered rows per flush.
    pub batch_rows: usize,
    /// Transform workers; `None` means `min(32, cpus * 4)`.
    pub workers: Option<usize>,
    /// Draw a progress bar on stderr.
    pub progress: bool,
}

impl ConvertOptions {
    /// Options with the historical defaults for everything but the paths.
    #[must_use]
    pub fn new(
        input: impl Into<PathBuf>,
        image_root: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        let sizing = ShardWriterOptions::default();
        Self {
            input: input.into(),
            image_root: image_root.into(),
            out_dir: out_dir.into(),
            source_tag: "blip_laion_cc_sbu".to_string(),
            records_per_shard: sizing.records_per_shard,
            batch_rows: sizing.batch_rows,
            workers: None,
            progress: false,
        }
    }
}

/// Final counts for one conversion run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvertReport {
    /// Entries pulled from the input, eligible or not.
    pub entries_seen: usize,
    /// Records that reached a shard.
    pub records_written: usize,
    /// Entries converted to drop-signals.
    pub dropped: usize,
    /// Shard files produced.
    pub shards_written: usize,
}

/// Run the whole conversion pipeline.
///
/// # Errors
/// Fatal conditions only: missing input, a non-array top level, a
/// malformed JSONL line, or an I/O failure while flushing or closing a
/// shard. Ineligible entries are dropped silently and counted. Rename
/// failures are logged and do not fail the run.
pub fn run_convert(opts: &ConvertOptions) -> Result<ConvertReport> {
    let reader = EntryReader::open(&opts.input)?;
    let total = reader.total_hint();
    if let Some(total) = total {
        info!(entries = total, "metadata loaded");
    }

    let workers = opts
        .workers
        .unwrap_or_else(|| default_workers(DEFAULT_WORKER_CAP));
    let image_root = opts.image_root.clone();
    let tag = opts.source_tag.clone();
    let outcomes = ParMap::new(reader, workers, move |entry| {
        entry.map(|e| transform_entry(&e, &image_root, &tag))
    })?;
    info!(workers, "transform pool ready");

    let mut writer = ShardWriter::create(
        &opts.out_dir,
        ShardWriterOptions {
            records_per_shard: opts.records_per_shard,
            batch_rows: opts.batch_rows,
        },
    )?;

    let pb = progress_bar(opts.progress, total);
    let mut entries_seen = 0usize;
    let mut dropped = 0usize;
    for outcome in outcomes {
        entries_seen += 1;
        match outcome? {
            Outcome::Transformed(record) => writer.accept(record)?,
            Outcome::Dropped(_) => dropped += 1,
        }
        pb.inc(1);
    }
    let (records_written, shards_written) = writer.finalize()?;
    pb.finish_and_clear();

    // Totals are only known now; shard names get them in a second pass.
    match finalize_shard_names(&opts.out_dir, SHARD_EXT) {
        Ok(renamed) => info!(renamed, "shard names finalized"),
        Err(e) => warn!(error = %e, "shard rename pass failed"),
    }

    let report = ConvertReport {
        entries_seen,
        records_written,
        dropped,
        shards_written,
    };
    info!(
        entries = report.entries_seen,
        written = report.records_written,
        dropped = report.dropped,
        shards = report.shards_written,
        "conversion complete"
    );
    Ok(report)
}

/// A bar when the total is known, a spinner otherwise, nothing when disabled.
pub(crate) fn progress_bar(enabled: bool, total: Option<usize>) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    match total {
        Some(n) => ProgressBar::new(n as u64),
        None => ProgressBar::new_spinner(),
    }
}
