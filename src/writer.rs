//! Sharded Parquet writing with a fixed four-column schema.
//!
//! [`ShardWriter`] owns the currently open shard handle and the pending
//! in-memory batch; nothing else mutates them. Rows are buffered until the
//! batch threshold, converted to an Arrow `RecordBatch` with explicit
//! builders (the schema carries a Binary column, so there is nothing to
//! trace), and appended to `part_<4-digit index>.parquet` in the output
//! directory. Shards rotate at `records_per_shard`; the last shard may be
//! short. Flush and close failures are fatal — swallowing them would lose
//! buffered rows silently.

use crate::entry::ShardRecord;
use anyhow::{Context, Result};
use arrow::array::{ArrayRef, BinaryBuilder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shard-file extension used throughout the pipeline.
pub const SHARD_EXT: &str = "parquet";

/// Sizing knobs for [`ShardWriter`].
#[derive(Clone, Copy, Debug)]
pub struct ShardWriterOptions {
    /// Rows per shard file; the historical default is 50k.
    pub records_per_shard: usize,
    /// Buffered rows per Arrow record batch.
    pub batch_rows: usize,
}

impl Default for ShardWriterOptions {
    fn default() -> Self {
        Self {
            records_per_shard: 50_000,
            batch_rows: 4096,
        }
    }
}

/// Accumulates [`ShardRecord`]s and flushes them to sequentially numbered
/// Parquet shards.
pub struct ShardWriter {
    out_dir: PathBuf,
    schema: SchemaRef,
    opts: ShardWriterOptions,
    batch: Vec<ShardRecord>,
    open: Option<ArrowWriter<File>>,
    shard_index: usize,
    rows_in_shard: usize,
    records_written: usize,
    shards_written: usize,
}

/// Pre-rename name of shard `index`.
#[must_use]
pub fn shard_file_name(index: usize) -> String {
    format!("part_{index:04}.{SHARD_EXT}")
}

/// The fixed output schema: `idx: Utf8, image: Binary, conversations: Utf8,
/// source: Utf8`, all non-nullable.
#[must_use]
pub fn shard_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("idx", DataType::Utf8, false),
        Field::new("image", DataType::Binary, false),
        Field::new("conversations", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
    ]))
}

impl ShardWriter {
    /// Create a writer rooted at `out_dir`, creating the directory if absent.
    ///
    /// # Errors
    /// Fails if the output directory cannot be created.
    pub fn create(out_dir: impl AsRef<Path>, opts: ShardWriterOptions) -> Result<Self> {
        let out_dir = out_dir.as_ref().to_path_buf();
        create_dir_all(&out_dir).with_context(|| format!("mkdir -p {}", out_dir.display()))?;
        Ok(Self {
            out_dir,
            schema: shard_schema(),
            opts: ShardWriterOptions {
                records_per_shard: opts.records_per_shard.max(1),
                batch_rows: opts.batch_rows.max(1),
            },
            batch: Vec::new(),
            open: None,
            shard_index: 0,
            rows_in_shard: 0,
            records_written: 0,
            shards_written: 0,
        })
    }

    /// Buffer one record, flushing and rotating as thresholds are reached.
    ///
    /// # Errors
    /// Any flush or close failure is fatal.
    pub fn accept(&mut self, record: ShardRecord) -> Result<()> {
        self.batch.push(record);
        if self.batch.len() >= self.opts.batch_rows {
            self.flush_batch()?;
        }
        self.rotate_if_full()
    }

    /// Close the current shard once it holds `records_per_shard` rows,
    /// pending batch included. The next [`accept`](Self::accept) opens a
    /// fresh shard.
    ///
    /// # Errors
    /// Any flush or close failure is fatal.
    pub fn rotate_if_full(&mut self) -> Result<()> {
        if self.rows_in_shard + self.batch.len() >= self.opts.records_per_shard {
            self.flush_batch()?;
            self.close_shard()?;
        }
        Ok(())
    }

    /// Flush the pending batch and close the open shard, short or not.
    ///
    /// Returns `(records_written, shards_written)` for the whole run.
    ///
    /// # Errors
    /// Any flush or close failure is fatal.
    pub fn finalize(mut self) -> Result<(usize, usize)> {
        self.flush_batch()?;
        self.close_shard()?;
        Ok((self.records_written, self.shards_written))
    }

    /// Convert the pending rows to a `RecordBatch` and append it to the
    /// open shard, opening the next shard file first if none is open.
    fn flush_batch(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let mut idx = StringBuilder::new();
        let mut image = BinaryBuilder::new();
        let mut conversations = StringBuilder::new();
        let mut source = StringBuilder::new();
        let rows = self.batch.len();
        for r in self.batch.drain(..) {
            idx.append_value(&r.idx);
            image.append_value(&r.image);
            conversations.append_value(&r.conversations);
            source.append_value(&r.source);
        }
        let columns: Vec<ArrayRef> = vec![
            Arc::new(idx.finish()),
            Arc::new(image.finish()),
            Arc::new(conversations.finish()),
            Arc::new(source.finish()),
        ];
        let batch = RecordBatch::try_new(self.schema.clone(), columns)
            .context("assemble shard record batch")?;

        if self.open.is_none() {
            let path = self.out_dir.join(shard_file_name(self.shard_index));
            let file =
                File::create(&path).with_context(|| format!("create {}", path.display()))?;
            let props = WriterProperties::builder()
                .set_compression(Compression::SNAPPY)
                .build();
            let writer = ArrowWriter::try_new(file, self.schema.clone(), Some(props))
                .with_context(|| format!("open parquet writer for {}", path.display()))?;
            self.open = Some(writer);
        }
        if let Some(writer) = self.open.as_mut() {
            writer
                .write(&batch)
                .with_context(|| format!("write batch to shard {}", self.shard_index))?;
        }
        self.rows_in_shard += rows;
        self.records_written += rows;
        Ok(())
    }

    fn close_shard(&mut self) -> Result<()> {
        if let Some(writer) = self.open.take() {
            writer
                .close()
                .with_context(|| format!("close shard {}", self.shard_index))?;
            self.shards_written += 1;
            self.shard_index += 1;
            self.rows_in_shard = 0;
        }
        Ok(())
    }
}
