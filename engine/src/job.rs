//! Run orchestration module.
//!
//! This module drives the date-range mover over a set of anchors:
//! - Creating a run from a validated configuration
//! - Planning a run (one window per anchor, one lookup per source)
//! - Running it (existence check then copy, per file)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::checksums;
use crate::config::RunConfig;
use crate::error::EngineError;
use crate::fs_ops::{self, CopyOutcome};
use crate::model::{FileRecord, FileState, RunState, SearchWindow, TransferRun};
use crate::progress::ProgressCallback;

/// Message recorded on records skipped because the destination has them.
pub const ALREADY_EXISTS: &str = "already exists";

/// Create a new run.
///
/// Validates the configuration against the filesystem; anchors are sorted
/// and de-duplicated.
///
/// # Errors
/// Returns `DirectoryNotFound` if a source directory or the destination's
/// parent is missing, and `Config` or `GranularityTooCoarse` for an
/// inconsistent configuration.
pub fn create_run(
    config: RunConfig,
    anchors: impl IntoIterator<Item = NaiveDateTime>,
) -> Result<TransferRun, EngineError> {
    config.validate()?;

    let mut anchors: Vec<_> = anchors.into_iter().collect();
    anchors.sort();
    anchors.dedup();

    let run = TransferRun {
        id: Uuid::new_v4(),
        config,
        anchors,
        records: Vec::new(),
        state: RunState::Pending,
        total_bytes_copied: 0,
        current_file_index: None,
        start_time: None,
        end_time: None,
    };
    log::debug!("run {} created with {} anchor(s)", run.id, run.anchors.len());
    Ok(run)
}

/// Plan a run by finding every file in every anchor's window.
///
/// A file reached from overlapping windows is planned once. Because the
/// destination is flat, a filename seen in two sources is kept from the first
/// source only.
///
/// # Errors
/// Returns EngineError if a source directory cannot be listed, or
/// `InvalidWindow` if an anchor's window leaves the supported date range.
pub fn plan_run(run: &mut TransferRun) -> Result<(), EngineError> {
    if run.state != RunState::Pending {
        return Err(EngineError::Config {
            message: format!("run must be Pending to plan; current state: {:?}", run.state),
        });
    }

    let destination = run.config.destination.clone();
    let pad = run.config.pad()?;
    let mut planned: HashMap<String, String> = HashMap::new();
    let mut records = Vec::new();

    for anchor in &run.anchors {
        let window = SearchWindow::around(*anchor, pad)?;
        log::debug!("run {}: anchor {} window {}", run.id, anchor, window);

        for spec in &run.config.sources {
            let pattern = spec.source.pattern();
            let names = fs_ops::find_files_in_date_range(
                &spec.dir,
                &window,
                &pattern,
                spec.source.granularity(),
            )?;

            for name in names {
                if let Some(first) = planned.get(&name) {
                    if first != spec.source.name() {
                        log::warn!(
                            "{} exists in both {} and {} sources; keeping the {} copy",
                            name,
                            first,
                            spec.source,
                            first
                        );
                    }
                    continue;
                }
                planned.insert(name.clone(), spec.source.name().to_string());

                let timestamp = pattern.timestamp_of(&name);
                let mut record =
                    FileRecord::new(name, &spec.dir, &destination, spec.source.name(), timestamp);
                record.exists_at_destination =
                    fs_ops::file_exists_at_destination(&destination, &record.filename);
                records.push(record);
            }
        }
    }

    log::info!("run {}: {} file(s) planned", run.id, records.len());
    run.records = records;
    Ok(())
}

/// Run a planned run, copying every file not already at the destination.
///
/// The destination check is repeated immediately before each copy decision.
/// Files that exist are Skipped and never copied. Individual copy failures
/// are recorded on the record and do NOT stop the run. In dry-run mode
/// records that would be copied are left Pending.
///
/// # Errors
/// Returns EngineError only if the run is not in the Pending state.
pub fn run_run(
    run: &mut TransferRun,
    progress_callback: Option<&dyn ProgressCallback>,
) -> Result<(), EngineError> {
    if run.state != RunState::Pending {
        return Err(EngineError::Config {
            message: format!("run must be Pending to execute; current state: {:?}", run.state),
        });
    }

    run.state = RunState::Running;
    run.start_time = Some(SystemTime::now());

    if let Some(callback) = progress_callback {
        callback.on_run_started(run);
    }

    let destination = run.config.destination.clone();

    for file_index in 0..run.records.len() {
        run.current_file_index = Some(file_index);

        if let Some(callback) = progress_callback {
            callback.on_file_started(run, file_index, &run.records[file_index]);
        }

        let filename = run.records[file_index].filename.clone();
        let source_dir = parent_dir(&run.records[file_index].source_path);

        let exists = fs_ops::file_exists_at_destination(&destination, &filename);
        run.records[file_index].exists_at_destination = exists;

        if exists {
            mark_already_exists(&mut run.records[file_index]);
        } else if run.config.dry_run {
            log::info!("dry run: would copy {}", filename);
        } else {
            run.records[file_index].state = FileState::Copying;
            match fs_ops::try_copy_file(&source_dir, &filename, &destination) {
                Ok(CopyOutcome::Copied { bytes }) => {
                    let record = &mut run.records[file_index];
                    record.bytes_copied = bytes;
                    record.state = FileState::Done;
                    record.exists_at_destination = true;
                    run.total_bytes_copied += bytes;

                    if let Some(algorithm) = run.config.verify {
                        verify(record, algorithm);
                    }
                }
                Ok(CopyOutcome::AlreadyPresent) => {
                    // Appeared between the check and the copy
                    let record = &mut run.records[file_index];
                    record.exists_at_destination = true;
                    mark_already_exists(record);
                }
                Err(e) => {
                    log::warn!("run {}: {}", run.id, e);
                    let record = &mut run.records[file_index];
                    record.state = FileState::Failed;
                    record.error_code = e.raw_os_error();
                    record.error_message = Some(e.to_string());
                }
            }
        }

        if let Some(callback) = progress_callback {
            callback.on_file_completed(run, file_index, &run.records[file_index]);
        }
    }

    run.state = RunState::Completed;
    run.end_time = Some(SystemTime::now());
    run.current_file_index = None;

    if let Some(callback) = progress_callback {
        callback.on_run_completed(run);
    }

    Ok(())
}

/// Create, plan and execute a run in one call.
pub fn fetch(
    config: RunConfig,
    anchors: impl IntoIterator<Item = NaiveDateTime>,
    progress_callback: Option<&dyn ProgressCallback>,
) -> Result<TransferRun, EngineError> {
    let mut run = create_run(config, anchors)?;
    plan_run(&mut run)?;
    run_run(&mut run, progress_callback)?;
    Ok(run)
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn mark_already_exists(record: &mut FileRecord) {
    log::info!("{} {}", record.filename, ALREADY_EXISTS);
    record.state = FileState::Skipped;
    record.error_message = Some(ALREADY_EXISTS.to_string());
}

fn verify(record: &mut FileRecord, algorithm: checksums::ChecksumAlgorithm) {
    match checksums::verify_record(record, algorithm) {
        Ok(true) => {}
        Ok(false) => {
            record.error_message =
                Some("Checksum verification failed: source and destination differ".to_string());
        }
        Err(e) => {
            record.error_message = Some(format!("Checksum verification error: {}", e));
        }
    }
}

/// Outcome counts for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Left Pending, which after a dry run means "would copy"
    pub pending: usize,
    pub bytes_copied: u64,
    /// (filename, message) for each failed record
    pub failures: Vec<(String, String)>,
    pub verification_mismatches: Vec<String>,
    /// (filename, message) for copies whose checksums could not be computed
    pub verification_errors: Vec<(String, String)>,
}

impl RunSummary {
    pub fn from_run(run: &TransferRun) -> Self {
        let mut summary = RunSummary {
            bytes_copied: run.total_bytes_copied,
            ..Default::default()
        };

        for record in &run.records {
            match record.state {
                FileState::Done => summary.done += 1,
                FileState::Skipped => summary.skipped += 1,
                FileState::Failed => {
                    summary.failed += 1;
                    summary.failures.push((
                        record.filename.clone(),
                        record
                            .error_message
                            .clone()
                            .unwrap_or_else(|| "(unknown error)".to_string()),
                    ));
                }
                FileState::Pending | FileState::Copying => summary.pending += 1,
            }
            match &record.verification {
                Some(v) if !v.passed() => {
                    summary.verification_mismatches.push(record.filename.clone());
                }
                Some(_) => {}
                None if run.config.verify.is_some() && record.state == FileState::Done => {
                    summary.verification_errors.push((
                        record.filename.clone(),
                        record
                            .error_message
                            .clone()
                            .unwrap_or_else(|| "(not verified)".to_string()),
                    ));
                }
                None => {}
            }
        }

        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
            || !self.verification_mismatches.is_empty()
            || !self.verification_errors.is_empty()
    }
}
