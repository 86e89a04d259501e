//! Anchor timestamps from satellite overpass files.
//!
//! ATL09 granule names carry the overpass time, either plainly
//! (`ATL09_20210811160643_07321201_005_01.h5`) or with a `processed_` prefix
//! added by subsetting tools. Each parsed time becomes the centre of a
//! search window.

use std::path::Path;

use chrono::NaiveDateTime;

use crate::error::EngineError;
use crate::fs_ops;

/// Formats tried in order against an anchor filename; any remainder is ignored.
pub const ANCHOR_FORMATS: [&str; 2] = ["ATL09_%Y%m%d%H%M%S", "processed_ATL09_%Y%m%d%H%M%S"];

/// Literal timestamps accepted by [`parse_anchor_arg`].
const LITERAL_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Parse the overpass time out of an anchor filename.
///
/// # Errors
/// Returns `TimestampParseFailure` if neither known format matches.
pub fn parse_anchor(filename: &str) -> Result<NaiveDateTime, EngineError> {
    ANCHOR_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_and_remainder(filename, fmt).ok())
        .map(|(t, _)| t)
        .ok_or_else(|| EngineError::TimestampParseFailure {
            name: filename.to_string(),
        })
}

/// Parse a command-line anchor: an anchor filename or a literal timestamp.
pub fn parse_anchor_arg(text: &str) -> Result<NaiveDateTime, EngineError> {
    if let Ok(t) = parse_anchor(text) {
        return Ok(t);
    }
    LITERAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .ok_or_else(|| EngineError::TimestampParseFailure {
            name: text.to_string(),
        })
}

/// Collect anchor times from every parsable filename in `dir`.
///
/// Names that match neither format are logged and skipped. The result is
/// sorted with duplicates removed.
///
/// # Errors
/// Returns `DirectoryNotFound` if `dir` does not exist.
pub fn anchors_from_dir(dir: &Path) -> Result<Vec<NaiveDateTime>, EngineError> {
    let mut anchors = Vec::new();

    for name in fs_ops::list_file_names(dir)? {
        match parse_anchor(&name) {
            Ok(t) => anchors.push(t),
            Err(e) => log::warn!("Skipping anchor: {}", e),
        }
    }

    anchors.sort();
    anchors.dedup();
    log::debug!("{} anchor(s) found in {}", anchors.len(), dir.display());
    Ok(anchors)
}
