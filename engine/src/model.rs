//! Core data model for date-range transfers.
//!
//! This module defines the main data structures:
//! - SearchWindow: the inclusive time range a run looks at
//! - Granularity, TimeUnit: how candidate timestamps are stepped and compared
//! - DataSource: the instrument kinds and their filename conventions
//! - FileRecord: a single file within a run
//! - TransferRun: the whole planned/executed run

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checksums::ChecksumValue;
use crate::config::RunConfig;
use crate::error::EngineError;
use crate::pattern::FileTimestampPattern;

/// Calendar units a filename pattern can encode, ordered coarse to fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeUnit {
    Year,
    Month,
    Day,
    Hour,
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeUnit::Year => write!(f, "year"),
            TimeUnit::Month => write!(f, "month"),
            TimeUnit::Day => write!(f, "day"),
            TimeUnit::Hour => write!(f, "hour"),
        }
    }
}

/// Step size used when enumerating candidate timestamps across a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
}

impl Granularity {
    /// The calendar unit this granularity steps over.
    pub fn unit(&self) -> TimeUnit {
        match self {
            Granularity::Hour => TimeUnit::Hour,
            Granularity::Day => TimeUnit::Day,
        }
    }

    pub fn step(&self) -> Duration {
        match self {
            Granularity::Hour => Duration::hours(1),
            Granularity::Day => Duration::days(1),
        }
    }

    /// Round a timestamp down to the start of its hour or day.
    pub fn truncate(&self, t: NaiveDateTime) -> NaiveDateTime {
        match self {
            Granularity::Hour => t.date().and_time(NaiveTime::MIN) + Duration::hours(t.hour() as i64),
            Granularity::Day => t.date().and_time(NaiveTime::MIN),
        }
    }

    /// Whether stepping at this granularity visits every value `finest` can take.
    pub fn covers(&self, finest: TimeUnit) -> bool {
        self.unit() >= finest
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unit())
    }
}

/// An inclusive time window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl SearchWindow {
    /// Create a window; `end` must not precede `start`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, EngineError> {
        if end < start {
            return Err(EngineError::InvalidWindow {
                reason: format!("end {} is before start {}", end, start),
            });
        }
        Ok(SearchWindow { start, end })
    }

    /// `[anchor - pad, anchor + pad]`. A negative pad is treated as its magnitude.
    ///
    /// # Errors
    /// Returns `InvalidWindow` if either bound falls outside the representable
    /// date range.
    pub fn around(anchor: NaiveDateTime, pad: Duration) -> Result<Self, EngineError> {
        let pad = pad.abs();
        let out_of_range = || EngineError::InvalidWindow {
            reason: format!("{} +/- {} is outside the supported date range", anchor, pad),
        };
        Ok(SearchWindow {
            start: anchor.checked_sub_signed(pad).ok_or_else(out_of_range)?,
            end: anchor.checked_add_signed(pad).ok_or_else(out_of_range)?,
        })
    }

    /// Inclusive membership once both sides are rounded down to `granularity`.
    ///
    /// A file stamped 14:00 belongs to a window starting at 14:06 when
    /// stepping hourly, because the 14:00 hour overlaps the window.
    pub fn overlaps_unit(&self, t: NaiveDateTime, granularity: Granularity) -> bool {
        let t = granularity.truncate(t);
        granularity.truncate(self.start) <= t && t <= granularity.truncate(self.end)
    }
}

impl fmt::Display for SearchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]",
            self.start.format("%Y-%m-%d %H:%M:%S"),
            self.end.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// The kinds of instrument data that can be fetched.
///
/// Each kind carries its own filename pattern and enumeration granularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DataSource {
    /// Micro-Pulse Lidar raw files, e.g. `202108111400.mpl.gz`
    Mpl,
    /// Millimeter Cloud Radar moments, e.g. `20212231400MMCRMom.nc.zip`
    Mmcr,
    /// Anything else, described explicitly
    Custom {
        name: String,
        pattern: FileTimestampPattern,
        granularity: Granularity,
    },
}

impl DataSource {
    pub fn name(&self) -> &str {
        match self {
            DataSource::Mpl => "mpl",
            DataSource::Mmcr => "mmcr",
            DataSource::Custom { name, .. } => name,
        }
    }

    pub fn pattern(&self) -> FileTimestampPattern {
        match self {
            DataSource::Mpl => FileTimestampPattern::mpl(),
            DataSource::Mmcr => FileTimestampPattern::mmcr(),
            DataSource::Custom { pattern, .. } => pattern.clone(),
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            DataSource::Mpl | DataSource::Mmcr => Granularity::Hour,
            DataSource::Custom { granularity, .. } => *granularity,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The state of an individual file within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Not yet processed
    Pending,
    /// Currently transferring
    Copying,
    /// Successfully copied
    Done,
    /// Already present at the destination
    Skipped,
    /// Error occurred; file not copied
    Failed,
}

impl FileState {
    /// Returns true if this state is terminal (no further changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileState::Done | FileState::Skipped | FileState::Failed)
    }
}

/// The state of an entire run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Created, not yet started
    Pending,
    /// Currently executing
    Running,
    /// All files processed (some may have failed)
    Completed,
}

/// Checksum comparison done after a copy.
#[derive(Debug, Clone)]
pub struct Verification {
    pub source: ChecksumValue,
    pub destination: ChecksumValue,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.source == self.destination
    }
}

/// A single file selected for transfer.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Bare filename, identical at source and destination
    pub filename: String,

    pub source_path: PathBuf,

    pub destination_path: PathBuf,

    /// Name of the data source this file came from
    pub source_kind: String,

    /// Timestamp parsed back out of the filename, if the pattern allows it
    pub timestamp: Option<NaiveDateTime>,

    /// Result of the most recent destination existence check
    pub exists_at_destination: bool,

    pub state: FileState,

    pub bytes_copied: u64,

    /// OS error code if state is Failed
    pub error_code: Option<i32>,

    /// Human-readable error or skip reason
    pub error_message: Option<String>,

    pub verification: Option<Verification>,
}

impl FileRecord {
    pub fn new(
        filename: String,
        source_dir: &std::path::Path,
        destination_dir: &std::path::Path,
        source_kind: &str,
        timestamp: Option<NaiveDateTime>,
    ) -> Self {
        FileRecord {
            source_path: source_dir.join(&filename),
            destination_path: destination_dir.join(&filename),
            filename,
            source_kind: source_kind.to_string(),
            timestamp,
            exists_at_destination: false,
            state: FileState::Pending,
            bytes_copied: 0,
            error_code: None,
            error_message: None,
            verification: None,
        }
    }
}

/// One planned or executed fetch run.
#[derive(Debug)]
pub struct TransferRun {
    /// Unique identifier for this run, used to correlate log lines
    pub id: Uuid,

    pub config: RunConfig,

    /// Reference timestamps the windows are centred on
    pub anchors: Vec<NaiveDateTime>,

    pub records: Vec<FileRecord>,

    pub state: RunState,

    pub total_bytes_copied: u64,

    /// Index of currently processing file (if Running)
    pub current_file_index: Option<usize>,

    pub start_time: Option<SystemTime>,

    pub end_time: Option<SystemTime>,
}

/// Convenience for building naive timestamps in tests and callers.
pub fn timestamp(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}
