//! Two-pass shard naming: embed the final shard total once it is known.
//!
//! Shards are written as `part_<4-digit index>.<ext>` because the total is
//! unknown until the input is exhausted. After finalization this pass
//! scans the output directory, counts the shards that do not yet carry a
//! total, and renames each to `part_<index>_of_<total>.<ext>`. Files
//! already carrying the `_of_` marker are left alone, so a second run is a
//! no-op. The caller treats this as a best-effort finishing step.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

const SHARD_PREFIX: &str = "part_";
const TOTAL_MARKER: &str = "_of_";

/// Rename `part_NNNN.<ext>` files in `dir` to `part_NNNN_of_TTTT.<ext>`.
///
/// Returns the number of files renamed (zero when all shards already carry
/// the total suffix).
///
/// # Errors
/// Fails if the directory cannot be read or a rename fails.
pub fn finalize_shard_names(dir: impl AsRef<Path>, ext: &str) -> Result<usize> {
    let dir = dir.as_ref();
    let mut pending: Vec<(usize, String)> = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("scan {}", dir.display()))? {
        let entry = entry.with_context(|| format!("scan {}", dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(index) = pending_shard_index(name, ext) {
            pending.push((index, name.to_string()));
        }
    }
    pending.sort_unstable();

    let total = pending.len();
    for (index, name) in &pending {
        let renamed = format!("{SHARD_PREFIX}{index:04}{TOTAL_MARKER}{total:04}.{ext}");
        fs::rename(dir.join(name), dir.join(&renamed))
            .with_context(|| format!("rename {name} -> {renamed} in {}", dir.display()))?;
    }
    Ok(total)
}

/// Shard index of a pre-rename file name, or `None` for anything else
/// (including names already carrying the total marker).
fn pending_shard_index(name: &str, ext: &str) -> Option<usize> {
    let stem = name
        .strip_prefix(SHARD_PREFIX)?
        .strip_suffix(ext)?
        .strip_suffix('.')?;
    if stem.contains(TOTAL_MARKER) {
        return None;
    }
    if stem.len() != 4 || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}
