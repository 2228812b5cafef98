//! Reconstruction: Parquet shards back to image files + a JSON dataset.
//!
//! The mirror of the conversion pipeline. Shard rows stream through the
//! same bounded parallel map; each worker validates the binary payload by
//! its magic bytes, writes it under `<out_root>/images/`, and emits a
//! lightweight record referencing the new relative path. Rows with an
//! unrecognizable payload are dropped, matching the forward direction's
//! best-effort policy. The collected records are written as one JSON
//! array.

use crate::entry::ShardRecord;
use crate::par_map::{DEFAULT_WORKER_CAP, ParMap, default_workers};
use crate::pipeline::progress_bar;
use anyhow::{Context, Result, bail};
use arrow::array::{Array, BinaryArray, StringArray};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::fs::{self, File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Everything `run_extract` needs to know.
#[derive(Clone, Debug)]
pub struct ExtractOptions {
    /// Directory holding `*.parquet` shards.
    pub shard_dir: PathBuf,
    /// Output root; images land under `<out_root>/images/`.
    pub out_root: PathBuf,
    /// Path of the rebuilt JSON array file.
    pub json_out: PathBuf,
    /// Decode/write workers; `None` means `min(32, cpus * 4)`.
    pub workers: Option<usize>,
    /// Draw a progress bar on stderr.
    pub progress: bool,
}

/// Final counts for one reconstruction run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtractReport {
    pub rows_seen: usize,
    pub images_written: usize,
    pub dropped: usize,
}

/// One rebuilt dataset record, pointing at the restored image file.
#[derive(Clone, Debug, Serialize)]
pub struct RestoredRecord {
    pub id: String,
    pub image: String,
    pub conversations: Value,
}

/// Lazy row stream over a set of shard files, one record batch in memory
/// at a time.
pub struct ShardRowReader {
    files: std::vec::IntoIter<PathBuf>,
    current: Option<(PathBuf, ParquetRecordBatchReader)>,
    pending: VecDeque<ShardRecord>,
}

impl ShardRowReader {
    /// Stream rows from `files` in the given order.
    #[must_use]
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files: files.into_iter(),
            current: None,
            pending: VecDeque::new(),
        }
    }
}

impl Iterator for ShardRowReader {
    type Item = Result<ShardRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            match self.current.take() {
                Some((path, mut reader)) => match reader.next() {
                    Some(Ok(batch)) => match decode_batch(&batch) {
                        Ok(rows) => {
                            self.pending = rows.into();
                            self.current = Some((path, reader));
                        }
                        Err(e) => {
                            return Some(
                                Err(e)
                                    .with_context(|| format!("decode rows in {}", path.display())),
                            );
                        }
                    },
                    Some(Err(e)) => {
                        return Some(
                            Err(e).with_context(|| format!("read batch from {}", path.display())),
                        );
                    }
                    None => {}
                },
                None => {
                    let path = self.files.next()?;
                    match open_shard_reader(&path) {
                        Ok(reader) => self.current = Some((path, reader)),
                        Err(e) => return Some(Err(e)),
                    }
                }
            }
        }
    }
}

fn open_shard_reader(path: &Path) -> Result<ParquetRecordBatchReader> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("open parquet reader for {}", path.display()))?
        .with_batch_size(1024)
        .build()
        .with_context(|| format!("build parquet reader for {}", path.display()))
}

/// Pull typed rows out of one record batch. A missing or mistyped column
/// means the file was not produced by this pipeline — that is fatal.
fn decode_batch(batch: &RecordBatch) -> Result<Vec<ShardRecord>> {
    let idx = string_column(batch, "idx")?;
    let conversations = string_column(batch, "conversations")?;
    let source = string_column(batch, "source")?;
    let image = batch
        .column_by_name("image")
        .and_then(|c| c.as_any().downcast_ref::<BinaryArray>())
        .context("shard column `image` missing or not Binary")?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        rows.push(ShardRecord {
            idx: idx.value(i).to_string(),
            image: image.value(i).to_vec(),
            conversations: conversations.value(i).to_string(),
            source: source.value(i).to_string(),
        });
    }
    Ok(rows)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .with_context(|| format!("shard column `{name}` missing or not Utf8"))
}

/// Read every row of one shard file. Convenience for small files and tests.
///
/// # Errors
/// Fails on unreadable files or schema mismatches.
pub fn read_shard_records(path: impl AsRef<Path>) -> Result<Vec<ShardRecord>> {
    ShardRowReader::new(vec![path.as_ref().to_path_buf()]).collect()
}

/// Shard files under `dir`, in name order.
///
/// # Errors
/// Fails if the directory cannot be scanned.
pub fn shard_paths(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let pattern = dir.as_ref().join("*.parquet");
    let pattern = pattern.to_string_lossy();
    let mut out = Vec::new();
    for p in glob::glob(&pattern).with_context(|| format!("bad shard pattern {pattern}"))? {
        out.push(p.with_context(|| format!("scan {pattern}"))?);
    }
    Ok(out)
}

/// File extension implied by the payload's magic bytes, or `None` when the
/// payload is not a recognizable image.
#[must_use]
pub fn image_extension(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else if bytes.starts_with(b"BM") {
        Some("bmp")
    } else {
        None
    }
}

/// Restore one row: validate the payload, write the image file, rebuild
/// the lightweight record. `None` drops the row.
fn restore_row(record: ShardRecord, images_dir: &Path) -> Option<RestoredRecord> {
    let Some(ext) = image_extension(&record.image) else {
        warn!(idx = %record.idx, "payload is not a recognizable image, skipping");
        return None;
    };
    let conversations: Value = match serde_json::from_str(&record.conversations) {
        Ok(v) => v,
        Err(_) => {
            warn!(idx = %record.idx, "conversations payload is not valid JSON, skipping");
            return None;
        }
    };
    let file_name = format!("{}.{ext}", record.idx);
    if let Err(e) = fs::write(images_dir.join(&file_name), &record.image) {
        warn!(idx = %record.idx, error = %e, "failed to write image, skipping");
        return None;
    }
    Some(RestoredRecord {
        id: record.idx,
        image: format!("images/{file_name}"),
        conversations,
    })
}

/// Run the whole reconstruction pipeline.
///
/// # Errors
/// Fatal conditions: an empty or unreadable shard directory, a schema
/// mismatch, or an unwritable JSON output path. Individual rows with
/// unrecognizable payloads are dropped and counted.
pub fn run_extract(opts: &ExtractOptions) -> Result<ExtractReport> {
    let shards = shard_paths(&opts.shard_dir)?;
    if shards.is_empty() {
        bail!("no parquet shards found in {}", opts.shard_dir.display());
    }
    info!(shards = shards.len(), "reading shards");

    let images_dir = opts.out_root.join("images");
    create_dir_all(&images_dir).with_context(|| format!("mkdir -p {}", images_dir.display()))?;

    let workers = opts
        .workers
        .unwrap_or_else(|| default_workers(DEFAULT_WORKER_CAP));
    let reader = ShardRowReader::new(shards);
    let worker_images_dir = images_dir.clone();
    let outcomes = ParMap::new(reader, workers, move |row| {
        row.map(|r| restore_row(r, &worker_images_dir))
    })?;

    let pb = progress_bar(opts.progress, None);
    let mut rows_seen = 0usize;
    let mut dropped = 0usize;
    let mut restored: Vec<RestoredRecord> = Vec::new();
    for outcome in outcomes {
        rows_seen += 1;
        match outcome? {
            Some(record) => restored.push(record),
            None => dropped += 1,
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if let Some(parent) = opts.json_out.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let f = File::create(&opts.json_out)
        .with_context(|| format!("create {}", opts.json_out.display()))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, &restored)
        .with_context(|| format!("serialize records to {}", opts.json_out.display()))?;
    w.flush()
        .with_context(|| format!("flush {}", opts.json_out.display()))?;

    let report = ExtractReport {
        rows_seen,
        images_written: restored.len(),
        dropped,
    };
    info!(
        rows = report.rows_seen,
        images = report.images_written,
        dropped = report.dropped,
        json = %opts.json_out.display(),
        "reconstruction complete"
    );
    Ok(report)
}
