//! # ICECAPS Engine - Date-Range File Fetching
//!
//! Copies instrument files (MPL lidar, MMCR radar, ...) whose filenames embed
//! a timestamp from archive directories into one flat working directory,
//! selecting only the files that fall near reference times such as ICESat-2
//! overpasses.
//!
//! ## Overview
//!
//! - Filename templates with date placeholders (`%Y%m%d%H*.mpl.gz`)
//! - Candidate glob enumeration across an inclusive time window
//! - Existence check before every copy; existing files are never overwritten
//! - Per-file outcome tracking; one failed copy does not stop a run
//! - Optional checksum verification after copying
//!
//! ## Basic Usage
//!
//! ```no_run
//! use icecaps_engine::{fetch, parse_anchor, DataSource, RunConfig, RunSummary};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunConfig::new("/home/users/me/icecaps")
//!     .with_source(DataSource::Mpl, "/gws/icecaps/mpl/raw")
//!     .with_source(DataSource::Mmcr, "/gws/icecaps/mmcr/mom");
//!
//! let anchor = parse_anchor("ATL09_20210811160643_07321201_005_01.h5")?;
//! let run = fetch(config, [anchor], None)?;
//!
//! let summary = RunSummary::from_run(&run);
//! println!("{} copied, {} already present", summary.done, summary.skipped);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **pattern**: filename timestamp templates
//! - **model**: windows, granularity, data sources, records
//! - **fs_ops**: candidate enumeration, lookup, existence check, copy
//! - **anchor**: reference timestamps from ATL09 filenames
//! - **config**: the per-run configuration object
//! - **job**: run orchestration (create, plan, run)
//! - **progress**: progress callback trait
//! - **checksums**: verify-after-copy digests

pub mod anchor;
pub mod checksums;
pub mod config;
pub mod error;
pub mod fs_ops;
pub mod job;
pub mod model;
pub mod pattern;
pub mod progress;

// Re-export main types and functions
pub use anchor::{anchors_from_dir, parse_anchor, parse_anchor_arg};
pub use checksums::{compute_file_checksum, ChecksumAlgorithm, ChecksumValue};
pub use config::{RunConfig, SourceSpec};
pub use error::EngineError;
pub use fs_ops::{
    copy_file, enumerate_candidate_names, file_exists_at_destination, find_files_in_date_range,
    try_copy_file, CandidateNames, CopyOutcome,
};
pub use job::{create_run, fetch, plan_run, run_run, RunSummary};
pub use model::{
    DataSource, FileRecord, FileState, Granularity, RunState, SearchWindow, TimeUnit, TransferRun,
};
pub use pattern::FileTimestampPattern;
pub use progress::ProgressCallback;
