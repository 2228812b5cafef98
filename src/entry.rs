//! Source-entry and output-record data model.
//!
//! A [`RawEntry`] is the loosely-shaped record found in a LLaVA-style
//! metadata file: an `id`, a relative `image` path, and a nested
//! `conversations` payload. All three are optional at parse time; the
//! transformer decides eligibility. A [`ShardRecord`] is the fixed-shape
//! row that lands in a Parquet shard.

use serde_json::Value;

/// One source entry, as found in the input JSON array or JSONL file.
///
/// Fields are kept as raw JSON values so that malformed entries parse
/// without error and are rejected later as drop-signals instead of
/// aborting the run.
#[derive(Clone, Debug, Default)]
pub struct RawEntry {
    /// Opaque identifier; a JSON string or number.
    pub id: Option<Value>,
    /// Image path relative to the image root.
    pub image: Option<Value>,
    /// Dialogue payload; arbitrary nested JSON.
    pub conversations: Option<Value>,
}

impl RawEntry {
    /// Pull the three known fields out of a parsed JSON value.
    ///
    /// Non-object values produce an entry with all fields absent, which the
    /// transformer drops. Unknown keys are ignored.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut map) => Self {
                id: map.remove("id"),
                image: map.remove("image"),
                conversations: map.remove("conversations"),
            },
            _ => Self::default(),
        }
    }

    /// The identifier in textual form, if present and non-empty.
    ///
    /// String ids must be non-empty; numeric ids are formatted as-is
    /// (an id of `0` is a valid id — only the textual form matters).
    #[must_use]
    pub fn id_text(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The relative image path, if present, a string, and non-empty.
    #[must_use]
    pub fn image_path(&self) -> Option<&str> {
        match self.image.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// The conversations payload, if present and non-empty.
    ///
    /// Null, empty strings, empty arrays, and empty objects all count as
    /// absent.
    #[must_use]
    pub fn conversations_value(&self) -> Option<&Value> {
        match self.conversations.as_ref()? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::Array(a) if a.is_empty() => None,
            Value::Object(m) if m.is_empty() => None,
            v => Some(v),
        }
    }
}

/// One fully materialized output row.
///
/// The schema is fixed for a whole run: `idx` and `source` are UTF-8,
/// `image` is the raw byte payload (never empty), and `conversations` is
/// the canonical JSON serialization of the original nested value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardRecord {
    pub idx: String,
    pub image: Vec<u8>,
    pub conversations: String,
    pub source: String,
}
