//! Lazy record reading from JSON array or JSON-Lines sources.
//!
//! Detection policy: attempt a whole-document parse first. If the document
//! parses and the top level is an array, entries come from that array; a
//! non-array top level aborts the run. If the whole-document parse fails,
//! the file is re-read as newline-delimited JSON, streaming line by line
//! and skipping blank lines — large JSONL inputs are never held in memory
//! at once.

use crate::entry::RawEntry;
use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

/// A lazy, finite, single-pass sequence of raw JSON records.
///
/// Yields `Result<Value>`: line-level parse failures in JSONL mode are
/// fatal and surface as errors with the offending line number.
#[derive(Debug)]
pub struct ValueReader {
    kind: Kind,
    total: Option<usize>,
}

#[derive(Debug)]
enum Kind {
    Array(std::vec::IntoIter<Value>),
    Lines {
        lines: Lines<BufReader<File>>,
        path: PathBuf,
        line_no: usize,
    },
}

impl ValueReader {
    /// Open a dataset file, detecting JSON-array vs. JSON-Lines form.
    ///
    /// # Errors
    /// Fails if the file cannot be opened, or if it parses as a single
    /// JSON document whose top level is not an array.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;

        // Whole-document attempt. For JSONL input this fails fast at the
        // second line without materializing the file.
        match serde_json::from_reader::<_, Value>(BufReader::new(f)) {
            Ok(Value::Array(items)) => {
                let total = items.len();
                Ok(Self {
                    kind: Kind::Array(items.into_iter()),
                    total: Some(total),
                })
            }
            Ok(other) => {
                bail!(
                    "top-level value in {} is {}, expected an array of records",
                    path.display(),
                    type_name(&other)
                )
            }
            Err(_) => {
                let f = File::open(path).with_context(|| format!("reopen {}", path.display()))?;
                Ok(Self {
                    kind: Kind::Lines {
                        lines: BufReader::new(f).lines(),
                        path: path.to_path_buf(),
                        line_no: 0,
                    },
                    total: None,
                })
            }
        }
    }

    /// Number of entries, when known up front (array form only).
    #[must_use]
    pub fn total_hint(&self) -> Option<usize> {
        self.total
    }
}

impl Iterator for ValueReader {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.kind {
            Kind::Array(items) => items.next().map(Ok),
            Kind::Lines {
                lines,
                path,
                line_no,
            } => loop {
                let line = match lines.next()? {
                    Ok(l) => l,
                    Err(e) => {
                        return Some(
                            Err(e).with_context(|| {
                                format!("read line {} in {}", *line_no + 1, path.display())
                            }),
                        );
                    }
                };
                *line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }
                return Some(serde_json::from_str::<Value>(&line).with_context(|| {
                    format!("parse JSONL line {} in {}", *line_no, path.display())
                }));
            },
        }
    }
}

/// [`ValueReader`] with each record narrowed to a [`RawEntry`].
pub struct EntryReader(ValueReader);

impl EntryReader {
    /// Open a dataset file; see [`ValueReader::open`] for the detection policy.
    ///
    /// # Errors
    /// Same failure modes as [`ValueReader::open`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self(ValueReader::open(path)?))
    }

    /// Number of entries, when known up front (array form only).
    #[must_use]
    pub fn total_hint(&self) -> Option<usize> {
        self.0.total_hint()
    }
}

impl Iterator for EntryReader {
    type Item = Result<RawEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.0.next()?.map(RawEntry::from_value))
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
