//! Error types for the fetch engine.
//!
//! The primary error type is `EngineError`, which represents run-level errors
//! that prevent a transfer from being planned or executed. File-level errors
//! are recorded in the FileRecord struct, not returned as EngineError.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::{Granularity, TimeUnit};

/// Errors that can occur at the run level.
///
/// `CopyFailure` is the exception: it is produced per file by
/// [`crate::fs_ops::try_copy_file`] and then recorded on the record rather
/// than stopping the run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Source or destination directory does not exist
    #[error("Directory not found: {}", path.display())]
    DirectoryNotFound { path: PathBuf },

    /// I/O error while copying a single file
    #[error("Failed to copy {} to {}: {source}", from.display(), to.display())]
    CopyFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Anchor filename did not match any known timestamp format
    #[error("Could not parse a timestamp from '{name}'")]
    TimestampParseFailure { name: String },

    /// Filename template could not be tokenised
    #[error("Invalid filename pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Enumeration step would skip over values the pattern encodes
    #[error("Granularity '{granularity}' is coarser than the pattern's finest unit '{finest}'")]
    GranularityTooCoarse {
        granularity: Granularity,
        finest: TimeUnit,
    },

    /// Window end lies before its start
    #[error("Invalid search window: {reason}")]
    InvalidWindow { reason: String },

    /// Failed to list a directory
    #[error("Failed to enumerate directory: {}", path.display())]
    EnumerationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create a directory
    #[error("Failed to create directory: {}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Run configuration could not be read or is inconsistent
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::CopyFailure { source, .. }
            | Self::EnumerationFailed { source, .. }
            | Self::DirectoryCreationFailed { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}
