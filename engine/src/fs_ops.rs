//! Filesystem operations module.
//!
//! This module provides the date-range file mover primitives:
//! - Enumerating candidate filename globs across a search window
//! - Finding source files whose embedded timestamp falls in the window
//! - Checking whether a file already exists at the destination
//! - Copying a single file without ever overwriting the destination

use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path};

use chrono::{Duration, NaiveDateTime};
use globset::Glob;

use crate::error::EngineError;
use crate::model::{Granularity, SearchWindow};
use crate::pattern::FileTimestampPattern;

/// Lazy sequence of candidate globs, one per step across a window.
///
/// The sequence is finite and can be restarted with [`CandidateNames::reset`]
/// or by cloning it before iterating. Adjacent steps may render the same glob
/// when the granularity is finer than the pattern; callers de-duplicate.
#[derive(Debug, Clone)]
pub struct CandidateNames {
    pattern: FileTimestampPattern,
    first: NaiveDateTime,
    current: NaiveDateTime,
    end: NaiveDateTime,
    step: Duration,
    exhausted: bool,
}

impl CandidateNames {
    /// Rewind to the first step.
    pub fn reset(&mut self) {
        self.current = self.first;
        self.exhausted = false;
    }
}

impl Iterator for CandidateNames {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.exhausted || self.current > self.end {
            return None;
        }
        let glob = self.pattern.render(&self.current);
        match self.current.checked_add_signed(self.step) {
            Some(next) => self.current = next,
            // Stepped past the last representable time
            None => self.exhausted = true,
        }
        Some(glob)
    }
}

/// Render `pattern` for every `granularity` step that overlaps `window`.
///
/// Stepping starts at `window.start` rounded down to the granularity, so the
/// unit containing the start is a candidate, and continues while the step is
/// not after `window.end`.
///
/// # Errors
/// Returns `GranularityTooCoarse` if stepping would skip values the pattern
/// encodes, e.g. daily steps over an hourly pattern.
pub fn enumerate_candidate_names(
    pattern: &FileTimestampPattern,
    window: &SearchWindow,
    granularity: Granularity,
) -> Result<CandidateNames, EngineError> {
    let finest = pattern.finest_unit();
    if !granularity.covers(finest) {
        return Err(EngineError::GranularityTooCoarse {
            granularity,
            finest,
        });
    }

    let first = granularity.truncate(window.start);
    Ok(CandidateNames {
        pattern: pattern.clone(),
        first,
        current: first,
        end: window.end,
        step: granularity.step(),
        exhausted: false,
    })
}

/// Find files in `source_dir` whose embedded timestamp falls in `window`.
///
/// The directory is listed once. Each distinct candidate glob is matched
/// against the listing and the union of matches is returned, unique and in
/// first-seen order. No matches is an empty Vec, not an error.
///
/// # Errors
/// Returns `DirectoryNotFound` if `source_dir` does not exist.
pub fn find_files_in_date_range(
    source_dir: &Path,
    window: &SearchWindow,
    pattern: &FileTimestampPattern,
    granularity: Granularity,
) -> Result<Vec<String>, EngineError> {
    let candidates = enumerate_candidate_names(pattern, window, granularity)?;
    let entries = list_file_names(source_dir)?;

    let mut seen_globs = HashSet::new();
    let mut seen_names = HashSet::new();
    let mut found = Vec::new();

    for candidate in candidates {
        if !seen_globs.insert(candidate.clone()) {
            continue;
        }

        let matcher = Glob::new(&candidate)
            .map_err(|e| EngineError::InvalidPattern {
                pattern: pattern.template().to_string(),
                reason: e.to_string(),
            })?
            .compile_matcher();

        let before = found.len();
        for name in &entries {
            if matcher.is_match(name) && seen_names.insert(name.as_str()) {
                found.push(name.clone());
            }
        }
        log::debug!(
            "{}: {} new match(es) for {}",
            source_dir.display(),
            found.len() - before,
            candidate
        );
    }

    Ok(found)
}

/// List the regular files directly under `dir`, sorted by name.
pub fn list_file_names(dir: &Path) -> Result<Vec<String>, EngineError> {
    require_dir(dir)?;

    let entries = fs::read_dir(dir).map_err(|e| EngineError::EnumerationFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::EnumerationFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

        // Follows symlinks so linked archive files still count
        if !entry.path().is_file() {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => log::warn!(
                "Ignoring non UTF-8 filename in {}: {:?}",
                dir.display(),
                raw
            ),
        }
    }

    names.sort();
    Ok(names)
}

/// Fail with `DirectoryNotFound` unless `dir` is an existing directory.
pub fn require_dir(dir: &Path) -> Result<(), EngineError> {
    match fs::metadata(dir) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::DirectoryNotFound {
            path: dir.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(EngineError::DirectoryNotFound {
            path: dir.to_path_buf(),
        }),
        Err(e) => Err(EngineError::EnumerationFailed {
            path: dir.to_path_buf(),
            source: e,
        }),
    }
}

/// True iff an entry named exactly `filename` exists directly under `destination_dir`.
///
/// Content, size and modification time are not compared. A destination
/// directory that does not exist yet simply holds nothing.
pub fn file_exists_at_destination(destination_dir: &Path, filename: &str) -> bool {
    is_bare_filename(filename) && fs::symlink_metadata(destination_dir.join(filename)).is_ok()
}

fn is_bare_filename(filename: &str) -> bool {
    let mut components = Path::new(filename).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// What happened when a copy was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The file was written to the destination
    Copied { bytes: u64 },
    /// A same-named entry was already there; nothing was touched
    AlreadyPresent,
}

/// Copy `filename` from `source_dir` into `destination_dir`, keeping its name.
///
/// The destination is opened with create-new semantics, so an existing file
/// is never truncated or overwritten. A copy that fails part way removes the
/// partial file it created. The source modification time is preserved.
///
/// # Errors
/// Returns `CopyFailure` for I/O errors on either side and
/// `DirectoryCreationFailed` if the destination directory cannot be created.
pub fn try_copy_file(
    source_dir: &Path,
    filename: &str,
    destination_dir: &Path,
) -> Result<CopyOutcome, EngineError> {
    let src = source_dir.join(filename);
    let dst = destination_dir.join(filename);
    let copy_failure = |source: io::Error| EngineError::CopyFailure {
        from: src.clone(),
        to: dst.clone(),
        source,
    };

    if !is_bare_filename(filename) {
        return Err(copy_failure(io::Error::new(
            io::ErrorKind::InvalidInput,
            "filename must not contain path components",
        )));
    }

    let mut src_file = fs::File::open(&src).map_err(copy_failure)?;
    let src_metadata = src_file.metadata().map_err(copy_failure)?;
    if !src_metadata.is_file() {
        return Err(copy_failure(io::Error::new(
            io::ErrorKind::InvalidInput,
            "source is not a regular file",
        )));
    }

    ensure_dir_exists(destination_dir)?;

    let bytes = match copy_into_new_file(&mut src_file, &src, &dst)? {
        CopyOutcome::Copied { bytes } => bytes,
        CopyOutcome::AlreadyPresent => return Ok(CopyOutcome::AlreadyPresent),
    };

    // Preserve modification time if available
    if let Ok(mtime) = src_metadata.modified() {
        if let Err(e) = filetime::set_file_mtime(&dst, filetime::FileTime::from_system_time(mtime)) {
            log::debug!("Could not preserve mtime on {}: {}", dst.display(), e);
        }
    }

    log::info!("Copied {} ({} bytes)", filename, bytes);
    Ok(CopyOutcome::Copied { bytes })
}

/// Stream `reader` into a newly created `dst`.
///
/// Never opens an existing `dst`. On a read or write error the partial file
/// is removed before the error is returned.
fn copy_into_new_file(
    reader: &mut impl Read,
    src: &Path,
    dst: &Path,
) -> Result<CopyOutcome, EngineError> {
    let copy_failure = |source: io::Error| EngineError::CopyFailure {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source,
    };

    let mut dst_file = match fs::OpenOptions::new().write(true).create_new(true).open(dst) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            log::debug!("{} already exists, not overwriting", dst.display());
            return Ok(CopyOutcome::AlreadyPresent);
        }
        Err(e) => return Err(copy_failure(e)),
    };

    let result = io::copy(reader, &mut dst_file).and_then(|n| {
        dst_file.sync_all()?;
        Ok(n)
    });
    drop(dst_file);

    match result {
        Ok(bytes) => Ok(CopyOutcome::Copied { bytes }),
        Err(e) => {
            if let Err(rm) = fs::remove_file(dst) {
                log::warn!("Could not remove partial copy {}: {}", dst.display(), rm);
            }
            Err(copy_failure(e))
        }
    }
}

/// Boolean form of [`try_copy_file`]: false on any failure, which is logged.
///
/// An already present destination is not a failure and returns true without
/// touching the existing file.
pub fn copy_file(source_dir: &Path, filename: &str, destination_dir: &Path) -> bool {
    match try_copy_file(source_dir, filename, destination_dir) {
        Ok(_) => true,
        Err(e) => {
            log::warn!("{}", e);
            false
        }
    }
}

/// Ensure `dir` exists, creating it if only the last component is missing.
///
/// # Errors
/// Returns `DirectoryCreationFailed` if the path is not a directory or its
/// parent does not exist.
pub fn ensure_dir_exists(dir: &Path) -> Result<(), EngineError> {
    match fs::metadata(dir) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "path exists but is not a directory",
            ),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("{} does not exist, creating it", dir.display());
            match fs::create_dir(dir) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
                Err(e) => Err(EngineError::DirectoryCreationFailed {
                    path: dir.to_path_buf(),
                    source: e,
                }),
            }
        }
        Err(e) => Err(EngineError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{timestamp, TimeUnit};
    use std::path::PathBuf;

    fn ts(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        timestamp(2021, 8, day, h, m, s).unwrap()
    }

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), name.as_bytes()).expect("Failed to write fixture");
        }
    }

    fn source_with(names: &[&str]) -> (tempfile::TempDir, PathBuf) {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir(&src).expect("Failed to create src dir");
        touch(&src, names);
        (temp_dir, src)
    }

    #[test]
    fn test_candidates_step_from_truncated_start() {
        let window = SearchWindow::new(ts(11, 14, 6, 43), ts(11, 18, 6, 43)).unwrap();
        let names: Vec<_> =
            enumerate_candidate_names(&FileTimestampPattern::mpl(), &window, Granularity::Hour)
                .unwrap()
                .collect();
        assert_eq!(
            names,
            vec![
                "2021081114*.mpl.gz",
                "2021081115*.mpl.gz",
                "2021081116*.mpl.gz",
                "2021081117*.mpl.gz",
                "2021081118*.mpl.gz",
            ]
        );
    }

    #[test]
    fn test_candidates_restartable() {
        let window = SearchWindow::new(ts(11, 0, 0, 0), ts(11, 2, 0, 0)).unwrap();
        let mut names =
            enumerate_candidate_names(&FileTimestampPattern::mpl(), &window, Granularity::Hour)
                .unwrap();
        let first: Vec<_> = names.by_ref().collect();
        assert_eq!(first.len(), 3);
        assert_eq!(names.next(), None);

        names.reset();
        let second: Vec<_> = names.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_candidates_stop_at_last_representable_time() {
        let end = NaiveDateTime::MAX;
        let window = SearchWindow::new(end - Duration::minutes(150), end).unwrap();
        let mut names =
            enumerate_candidate_names(&FileTimestampPattern::mpl(), &window, Granularity::Hour)
                .unwrap();

        let globs: Vec<_> = names.by_ref().collect();
        assert_eq!(globs.len(), 3);
        assert_eq!(globs[2], "262143123123*.mpl.gz");
        assert_eq!(names.next(), None);

        names.reset();
        assert_eq!(names.count(), 3);
    }

    #[test]
    fn test_candidates_finer_granularity_repeats_daily_globs() {
        let pattern = FileTimestampPattern::parse("%Y%m%d*.mpl.gz").unwrap();
        let window = SearchWindow::new(ts(11, 22, 0, 0), ts(12, 1, 0, 0)).unwrap();
        let names: Vec<_> = enumerate_candidate_names(&pattern, &window, Granularity::Hour)
            .unwrap()
            .collect();
        assert_eq!(names.len(), 4);
        assert_eq!(names[0], names[1]);
        assert_eq!(names[2], "20210812*.mpl.gz");
    }

    #[test]
    fn test_coarse_granularity_is_rejected() {
        // Two hour window over an hourly pattern must not silently yield nothing
        let window = SearchWindow::new(ts(11, 14, 0, 0), ts(11, 16, 0, 0)).unwrap();
        let result =
            enumerate_candidate_names(&FileTimestampPattern::mpl(), &window, Granularity::Day);
        match result {
            Err(EngineError::GranularityTooCoarse { granularity, finest }) => {
                assert_eq!(granularity, Granularity::Day);
                assert_eq!(finest, TimeUnit::Hour);
            }
            other => panic!("expected GranularityTooCoarse, got {:?}", other),
        }

        let (_tmp, src) = source_with(&["202108111400xx.mpl.gz", "202108111500xx.mpl.gz"]);
        assert!(find_files_in_date_range(
            &src,
            &window,
            &FileTimestampPattern::mpl(),
            Granularity::Day
        )
        .is_err());
        let found = find_files_in_date_range(
            &src,
            &window,
            &FileTimestampPattern::mpl(),
            Granularity::Hour,
        )
        .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_find_overpass_example() {
        let (_tmp, src) = source_with(&[
            "202108111400xx.mpl.gz",
            "202108111600xx.mpl.gz",
            "202108112000xx.mpl.gz",
        ]);
        let window = SearchWindow::around(ts(11, 16, 6, 43), Duration::hours(2)).unwrap();

        let found = find_files_in_date_range(
            &src,
            &window,
            &FileTimestampPattern::mpl(),
            Granularity::Hour,
        )
        .unwrap();
        assert_eq!(found, vec!["202108111400xx.mpl.gz", "202108111600xx.mpl.gz"]);
    }

    #[test]
    fn test_find_window_boundaries() {
        let (_tmp, src) = source_with(&[
            "202108111300.mpl.gz",
            "202108111400.mpl.gz",
            "202108111800.mpl.gz",
            "202108111900.mpl.gz",
        ]);
        let window = SearchWindow::new(ts(11, 14, 0, 0), ts(11, 18, 0, 0)).unwrap();

        let found = find_files_in_date_range(
            &src,
            &window,
            &FileTimestampPattern::mpl(),
            Granularity::Hour,
        )
        .unwrap();
        assert_eq!(found, vec!["202108111400.mpl.gz", "202108111800.mpl.gz"]);
    }

    #[test]
    fn test_find_matches_exactly_files_in_window() {
        let pattern = FileTimestampPattern::mpl();
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path();
        let mut t = ts(10, 0, 0, 0);
        while t < ts(13, 0, 0, 0) {
            fs::write(src.join(format!("{}.mpl.gz", t.format("%Y%m%d%H%M"))), b"x").unwrap();
            t += Duration::hours(1);
        }
        touch(src, &["notes.txt", "2021081112.nc.zip"]);

        let windows = [
            SearchWindow::new(ts(10, 0, 0, 0), ts(10, 0, 0, 0)).unwrap(),
            SearchWindow::new(ts(10, 23, 59, 59), ts(11, 0, 0, 1)).unwrap(),
            SearchWindow::around(ts(11, 12, 30, 0), Duration::hours(5)).unwrap(),
            SearchWindow::new(ts(12, 20, 0, 0), ts(14, 0, 0, 0)).unwrap(),
        ];
        let all = list_file_names(src).unwrap();

        for window in &windows {
            let mut found =
                find_files_in_date_range(src, window, &pattern, Granularity::Hour).unwrap();
            found.sort();
            let expected: Vec<String> = all
                .iter()
                .filter(|name| {
                    pattern
                        .timestamp_of(name)
                        .is_some_and(|t| window.overlaps_unit(t, Granularity::Hour))
                })
                .cloned()
                .collect();
            assert_eq!(found, expected, "window {}", window);
        }
    }

    #[test]
    fn test_find_julian_day_files() {
        let (_tmp, src) = source_with(&[
            "20212221200MMCRMom.nc.zip",
            "20212230000MMCRMom.nc.zip",
            "20212232300MMCRMom.nc.zip",
            "20212240000MMCRMom.nc.zip",
        ]);
        let pattern = FileTimestampPattern::parse("%Y%j*.nc.zip").unwrap();
        let window = SearchWindow::new(ts(11, 6, 0, 0), ts(11, 18, 0, 0)).unwrap();

        let found = find_files_in_date_range(&src, &window, &pattern, Granularity::Day).unwrap();
        assert_eq!(
            found,
            vec!["20212230000MMCRMom.nc.zip", "20212232300MMCRMom.nc.zip"]
        );

        // Hourly steps over a daily pattern find the same files once each
        let hourly = find_files_in_date_range(&src, &window, &pattern, Granularity::Hour).unwrap();
        assert_eq!(found, hourly);
    }

    #[test]
    fn test_find_ignores_directories() {
        let (_tmp, src) = source_with(&["2021081114.mpl.gz"]);
        fs::create_dir(src.join("2021081115.mpl.gz")).unwrap();
        let window = SearchWindow::new(ts(11, 14, 0, 0), ts(11, 15, 0, 0)).unwrap();

        let found = find_files_in_date_range(
            &src,
            &window,
            &FileTimestampPattern::mpl(),
            Granularity::Hour,
        )
        .unwrap();
        assert_eq!(found, vec!["2021081114.mpl.gz"]);
    }

    #[test]
    fn test_find_no_matches_is_empty() {
        let (_tmp, src) = source_with(&["202108112000xx.mpl.gz"]);
        let window = SearchWindow::new(ts(11, 14, 0, 0), ts(11, 15, 0, 0)).unwrap();
        let found = find_files_in_date_range(
            &src,
            &window,
            &FileTimestampPattern::mpl(),
            Granularity::Hour,
        )
        .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_find_missing_source_dir() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let window = SearchWindow::new(ts(11, 14, 0, 0), ts(11, 15, 0, 0)).unwrap();
        let result = find_files_in_date_range(
            &temp_dir.path().join("nonexistent"),
            &window,
            &FileTimestampPattern::mpl(),
            Granularity::Hour,
        );
        assert!(matches!(result, Err(EngineError::DirectoryNotFound { .. })));
    }

    #[test]
    fn test_exists_false_for_missing_destination_dir() {
        let (tmp, src) = source_with(&["2021081114.mpl.gz"]);
        let dst = tmp.path().join("dst");

        assert!(!file_exists_at_destination(&dst, "2021081114.mpl.gz"));
        assert!(copy_file(&src, "2021081114.mpl.gz", &dst));
        assert!(file_exists_at_destination(&dst, "2021081114.mpl.gz"));
        assert!(!file_exists_at_destination(&dst, "2021081115.mpl.gz"));
    }

    #[test]
    fn test_exists_only_checks_direct_children() {
        let (tmp, _src) = source_with(&[]);
        let dst = tmp.path().join("dst");
        fs::create_dir_all(dst.join("nested")).unwrap();
        touch(&dst.join("nested"), &["a.mpl.gz"]);

        assert!(!file_exists_at_destination(&dst, "a.mpl.gz"));
        assert!(!file_exists_at_destination(&dst, "nested/a.mpl.gz"));
        assert!(!file_exists_at_destination(&dst, ""));
    }

    #[test]
    fn test_copy_is_byte_for_byte() {
        let (tmp, src) = source_with(&[]);
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(src.join("2021081114.mpl.gz"), &payload).unwrap();
        let dst = tmp.path().join("dst");

        let outcome = try_copy_file(&src, "2021081114.mpl.gz", &dst).unwrap();
        assert_eq!(outcome, CopyOutcome::Copied { bytes: 200_000 });
        assert_eq!(fs::read(dst.join("2021081114.mpl.gz")).unwrap(), payload);
    }

    #[test]
    fn test_copy_twice_is_idempotent() {
        let (tmp, src) = source_with(&["2021081114.mpl.gz"]);
        let dst = tmp.path().join("dst");

        assert!(copy_file(&src, "2021081114.mpl.gz", &dst));
        let first = fs::read(dst.join("2021081114.mpl.gz")).unwrap();

        assert_eq!(
            try_copy_file(&src, "2021081114.mpl.gz", &dst).unwrap(),
            CopyOutcome::AlreadyPresent
        );
        assert!(copy_file(&src, "2021081114.mpl.gz", &dst));
        assert_eq!(fs::read(dst.join("2021081114.mpl.gz")).unwrap(), first);
    }

    #[test]
    fn test_copy_never_overwrites_existing_destination() {
        let (tmp, src) = source_with(&["2021081114.mpl.gz"]);
        let dst = tmp.path().join("dst");
        fs::create_dir(&dst).unwrap();
        fs::write(dst.join("2021081114.mpl.gz"), b"previously transferred").unwrap();

        assert!(copy_file(&src, "2021081114.mpl.gz", &dst));
        assert_eq!(
            fs::read(dst.join("2021081114.mpl.gz")).unwrap(),
            b"previously transferred"
        );
    }

    #[test]
    fn test_copy_missing_source_returns_false() {
        let (tmp, src) = source_with(&[]);
        let dst = tmp.path().join("dst");

        assert!(!copy_file(&src, "2021081114.mpl.gz", &dst));
        assert!(matches!(
            try_copy_file(&src, "2021081114.mpl.gz", &dst),
            Err(EngineError::CopyFailure { .. })
        ));
        assert!(!file_exists_at_destination(&dst, "2021081114.mpl.gz"));
    }

    #[test]
    fn test_copy_needs_destination_parent() {
        let (tmp, src) = source_with(&["2021081114.mpl.gz"]);
        let dst = tmp.path().join("missing").join("dst");

        assert!(!copy_file(&src, "2021081114.mpl.gz", &dst));
        assert!(!dst.exists());
    }

    #[test]
    fn test_copy_rejects_path_like_filenames() {
        let (tmp, src) = source_with(&["2021081114.mpl.gz"]);
        let dst = tmp.path().join("dst");
        assert!(!copy_file(&src, "../src/2021081114.mpl.gz", &dst));
    }

    struct FailingReader {
        remaining: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "device went away"));
            }
            let n = buf.len().min(self.remaining);
            buf[..n].fill(b'x');
            self.remaining -= n;
            Ok(n)
        }
    }

    #[test]
    fn test_copy_failing_mid_stream_removes_partial_file() {
        let (tmp, src) = source_with(&[]);
        let dst = tmp.path().join("2021081114.mpl.gz");
        let mut reader = FailingReader { remaining: 10_000 };

        let result = copy_into_new_file(&mut reader, &src.join("2021081114.mpl.gz"), &dst);

        match result {
            Err(EngineError::CopyFailure { to, source, .. }) => {
                assert_eq!(to, dst);
                assert_eq!(source.kind(), io::ErrorKind::Other);
            }
            other => panic!("expected CopyFailure, got {:?}", other),
        }
        assert!(!dst.exists());
        assert!(!file_exists_at_destination(tmp.path(), "2021081114.mpl.gz"));
    }

    #[test]
    fn test_copy_into_existing_file_is_left_alone() {
        let (tmp, _src) = source_with(&[]);
        let dst = tmp.path().join("2021081114.mpl.gz");
        fs::write(&dst, b"kept").unwrap();
        let mut reader = FailingReader { remaining: 10 };

        let outcome = copy_into_new_file(&mut reader, Path::new("unused"), &dst).unwrap();

        assert_eq!(outcome, CopyOutcome::AlreadyPresent);
        assert_eq!(fs::read(&dst).unwrap(), b"kept");
    }

    #[test]
    fn test_copy_preserves_mtime() {
        let (tmp, src) = source_with(&["2021081114.mpl.gz"]);
        let then = filetime::FileTime::from_unix_time(1_628_690_400, 0);
        filetime::set_file_mtime(src.join("2021081114.mpl.gz"), then).unwrap();
        let dst = tmp.path().join("dst");

        assert!(copy_file(&src, "2021081114.mpl.gz", &dst));
        let copied = fs::metadata(dst.join("2021081114.mpl.gz")).unwrap();
        assert_eq!(filetime::FileTime::from_last_modification_time(&copied), then);
    }

    #[test]
    fn test_ensure_dir_exists_rejects_file() {
        let (tmp, _src) = source_with(&[]);
        let path = tmp.path().join("plain.txt");
        fs::write(&path, b"x").unwrap();
        assert!(ensure_dir_exists(&path).is_err());
        assert!(ensure_dir_exists(tmp.path()).is_ok());
    }
}
