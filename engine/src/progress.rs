//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which decouples the run
//! loop from how outcomes are shown (terse line, verbose listing, logs).

use crate::model::{FileRecord, TransferRun};

/// Trait for receiving progress updates from a run.
///
/// All methods are called synchronously during execution.
pub trait ProgressCallback: Send {
    /// Called when run execution starts.
    fn on_run_started(&self, run: &TransferRun);

    /// Called when a file is about to be processed.
    fn on_file_started(&self, run: &TransferRun, file_index: usize, file: &FileRecord);

    /// Called when a file is done (copied, skipped, or failed).
    fn on_file_completed(&self, run: &TransferRun, file_index: usize, file: &FileRecord);

    /// Called when all files have been processed.
    fn on_run_completed(&self, run: &TransferRun);
}
