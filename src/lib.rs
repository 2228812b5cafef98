//! # visprep
//!
//! Data-preparation utilities for vision-language (LLaVA-style) training
//! sets. The core is a streaming JSON → Parquet shard conversion pipeline;
//! around it sit the supporting stages a training run needs: filtering,
//! uniform down-sampling, and reconstruction of images + JSON from shards.
//!
//! ## The conversion pipeline
//!
//! - [`reader`] — lazy record reading from a JSON array or JSON-Lines file
//! - [`transform`] — one entry in, one [`ShardRecord`] or drop-signal out
//! - [`par_map`] — bounded, order-preserving parallel map over the stream
//! - [`writer`] — fixed-schema Parquet shards with sequential numbering
//! - [`rename`] — second-pass `part_NNNN_of_TTTT` naming once totals are known
//! - [`pipeline`] — the driver wiring the above together
//!
//! Ineligible entries (missing fields, missing or unreadable images) are
//! dropped silently and reduce yield; only resource-level failures abort a
//! run. In-flight memory is bounded by the worker window and the pending
//! batch, never by dataset size.
//!
//! ## Quick start
//!
//! ```ignore
//! use visprep::{ConvertOptions, run_convert};
//!
//! let mut opts = ConvertOptions::new("meta.json", "images/", "parquets/");
//! opts.records_per_shard = 50_000;
//! let report = run_convert(&opts)?;
//! println!("{} records in {} shards", report.records_written, report.shards_written);
//! ```
//!
//! ## Supporting stages
//!
//! - [`filter`] — substring exclusion on image paths + target-count sampling
//! - [`sampler`] — deterministic uniform sampling without replacement
//! - [`extract`] — shards back to image files and a rebuilt JSON array

pub mod entry;
pub mod extract;
pub mod filter;
pub mod par_map;
pub mod pipeline;
pub mod reader;
pub mod rename;
pub mod sampler;
pub mod transform;
pub mod writer;

pub use entry::{RawEntry, ShardRecord};
pub use extract::{
    ExtractOptions, ExtractReport, RestoredRecord, ShardRowReader, read_shard_records, run_extract,
    shard_paths,
};
pub use filter::{filter_records, load_records, run_filter, run_sample, write_records_json};
pub use par_map::{DEFAULT_WORKER_CAP, ParMap, default_workers};
pub use pipeline::{ConvertOptions, ConvertReport, run_convert};
pub use reader::{EntryReader, ValueReader};
pub use rename::finalize_shard_names;
pub use sampler::{Reservoir, sample_records};
pub use transform::{DropReason, Outcome, transform_entry};
pub use writer::{SHARD_EXT, ShardWriter, ShardWriterOptions, shard_file_name, shard_schema};
