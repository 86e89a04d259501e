//! icecaps-fetch - Command-line driver for the date-range fetch engine.
//!
//! Collects anchor times (literal timestamps or ATL09 granule names), builds a
//! run configuration from flags and/or a JSON file, then copies every MPL and
//! MMCR file near each anchor into one flat directory, reporting per-file
//! outcomes to stderr.

use std::io::Write;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::Parser;
use icecaps_engine::{
    anchors_from_dir,
    job::{create_run, plan_run, run_run, RunSummary},
    model::{FileRecord, FileState, TransferRun},
    parse_anchor_arg,
    progress::ProgressCallback,
    ChecksumAlgorithm, DataSource, RunConfig, SourceSpec,
};

/// Copy archive files whose timestamps fall near reference times
#[derive(Parser, Debug)]
#[command(name = "icecaps-fetch")]
#[command(version)]
#[command(about = "Copy MPL/MMCR files within a time window of each anchor")]
struct Args {
    /// JSON run configuration; flags below override or extend it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Destination directory (flat; created if only the last component is missing)
    #[arg(long, value_name = "PATH")]
    dst: Option<PathBuf>,

    /// Directory of raw MPL files (YYYYMMDDHH*.mpl.gz)
    #[arg(long, value_name = "PATH")]
    mpl: Option<PathBuf>,

    /// Directory of MMCR moment files (YYYYJJJHH*MMCRMom.nc.zip)
    #[arg(long, value_name = "PATH")]
    mmcr: Option<PathBuf>,

    /// Anchor time: an ATL09 filename or YYYY-MM-DDTHH:MM:SS (repeatable)
    #[arg(long = "anchor", value_name = "ANCHOR")]
    anchors: Vec<String>,

    /// Directory of ATL09 files whose names provide anchor times
    #[arg(long, value_name = "PATH")]
    anchor_dir: Option<PathBuf>,

    /// Window half-width around each anchor, in hours
    #[arg(long, value_name = "HOURS")]
    pad_hours: Option<f64>,

    /// List what would be copied without copying
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose output
    #[arg(long)]
    verbose: bool,

    /// Enable verification after copy (compares checksums)
    #[arg(long)]
    verify: bool,

    /// Checksum algorithm for verification: md5, sha256, blake3
    #[arg(long, value_name = "ALGORITHM", default_value = "sha256", requires = "verify")]
    hash: String,
}

/// CLI implementation of ProgressCallback
struct CliProgress {
    verbose: bool,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress { verbose }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    fn status(file: &FileRecord) -> (&'static str, char) {
        match file.state {
            FileState::Done => ("Copied", '.'),
            FileState::Skipped => ("Already exists", 's'),
            FileState::Failed => ("Failed", 'F'),
            FileState::Pending => ("Would copy", '?'),
            FileState::Copying => ("Copying", '~'),
        }
    }
}

impl ProgressCallback for CliProgress {
    fn on_run_started(&self, run: &TransferRun) {
        eprintln!("Run {}", run.id);
        eprintln!("  Destination: {}", run.config.destination.display());
        for spec in &run.config.sources {
            eprintln!(
                "  Source ({}): {} [{}]",
                spec.source,
                spec.dir.display(),
                spec.source.pattern()
            );
        }
        eprintln!(
            "  {} anchor(s), +/- {} min, {} file(s) in range",
            run.anchors.len(),
            run.config.pad_minutes,
            run.records.len()
        );
        if !self.verbose {
            eprint!("  ");
        }
    }

    fn on_file_started(&self, _run: &TransferRun, _file_index: usize, _file: &FileRecord) {}

    fn on_file_completed(&self, _run: &TransferRun, file_index: usize, file: &FileRecord) {
        let (label, mark) = Self::status(file);
        if self.verbose {
            let time = file
                .timestamp
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "?".to_string());
            eprintln!(
                "[{:3}] {:<14} {} ({}, {})",
                file_index, label, file.filename, file.source_kind, time
            );
            if file.state == FileState::Failed {
                if let Some(msg) = &file.error_message {
                    match file.error_code {
                        Some(code) => eprintln!("      os error {}: {}", code, msg),
                        None => eprintln!("      {}", msg),
                    }
                }
            }
        } else {
            eprint!("{}", mark);
            let _ = std::io::stderr().flush();
        }
    }

    fn on_run_completed(&self, run: &TransferRun) {
        if !self.verbose {
            eprintln!();
        }

        let summary = RunSummary::from_run(run);
        eprintln!(
            "Summary: {} copied, {} already present, {} failed",
            summary.done, summary.skipped, summary.failed
        );
        if run.config.dry_run {
            eprintln!("Dry run: {} file(s) would be copied", summary.pending);
        }
        eprintln!("Bytes copied: {}", Self::format_bytes(summary.bytes_copied));
        if let Some(elapsed) = run
            .start_time
            .zip(run.end_time)
            .and_then(|(start, end)| end.duration_since(start).ok())
        {
            eprintln!("Elapsed: {:.1}s", elapsed.as_secs_f64());
        }

        if !summary.failures.is_empty() {
            eprintln!();
            eprintln!("Failed files (re-run to retry):");
            for (name, msg) in &summary.failures {
                eprintln!("  {}: {}", name, msg);
            }
        }

        if !summary.verification_mismatches.is_empty() {
            eprintln!();
            eprintln!("Verification mismatches:");
            for name in &summary.verification_mismatches {
                eprintln!("  {}: source and destination checksums differ", name);
            }
        }

        if !summary.verification_errors.is_empty() {
            eprintln!();
            eprintln!("Could not verify:");
            for (name, msg) in &summary.verification_errors {
                eprintln!("  {}: {}", name, msg);
            }
        }
    }
}

/// Parse arguments, run, and map the outcome to an exit code
fn main() {
    // Initialize logger (controlled by RUST_LOG environment variable)
    // Example: RUST_LOG=debug icecaps-fetch --dst ...
    env_logger::init();

    let args = Args::parse();

    let exit_code = match run_cli(&args) {
        Ok(summary) if summary.has_failures() => 1,
        Ok(_) => 0,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Build the run configuration from the optional file and the flags
fn build_config(args: &Args) -> Result<RunConfig, String> {
    let mut config = match (&args.config, &args.dst) {
        (Some(path), _) => RunConfig::load(path).map_err(|e| e.to_string())?,
        (None, Some(dst)) => RunConfig::new(dst),
        (None, None) => return Err("Either --config or --dst is required".to_string()),
    };

    if let Some(dst) = &args.dst {
        config.destination = dst.clone();
    }
    if let Some(dir) = &args.mpl {
        config.sources.push(SourceSpec::new(DataSource::Mpl, dir));
    }
    if let Some(dir) = &args.mmcr {
        config.sources.push(SourceSpec::new(DataSource::Mmcr, dir));
    }
    if config.sources.is_empty() {
        return Err("No sources given; use --mpl, --mmcr or a config file".to_string());
    }

    if let Some(hours) = args.pad_hours {
        if !hours.is_finite() || hours < 0.0 {
            return Err(format!("Invalid pad '{}'. Must be a non-negative number of hours", hours));
        }
        config.pad_minutes = (hours * 60.0).round() as i64;
    }

    config.dry_run |= args.dry_run;

    if args.verify {
        match ChecksumAlgorithm::from_str(&args.hash) {
            Some(algo) => config.verify = Some(algo),
            None => {
                return Err(format!(
                    "Invalid hash algorithm '{}'. Must be 'md5', 'sha256', or 'blake3'",
                    args.hash
                ))
            }
        }
    }

    Ok(config)
}

/// Gather anchors from flags and the anchor directory.
///
/// An anchor that cannot be parsed is reported and skipped.
fn collect_anchors(args: &Args) -> Result<Vec<NaiveDateTime>, String> {
    let mut anchors = Vec::new();

    for text in &args.anchors {
        match parse_anchor_arg(text) {
            Ok(t) => anchors.push(t),
            Err(e) => eprintln!("Warning: {} (skipped)", e),
        }
    }

    if let Some(dir) = &args.anchor_dir {
        anchors.extend(anchors_from_dir(dir).map_err(|e| e.to_string())?);
    }

    if anchors.is_empty() {
        return Err("No valid anchors; use --anchor or --anchor-dir".to_string());
    }
    Ok(anchors)
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<RunSummary, String> {
    let config = build_config(args)?;
    let anchors = collect_anchors(args)?;

    let mut run = create_run(config, anchors).map_err(|e| format!("Run creation failed: {}", e))?;
    log::debug!("run {} configured: {:?}", run.id, run.config);

    plan_run(&mut run).map_err(|e| format!("Run planning failed: {}", e))?;

    let progress = CliProgress::new(args.verbose);
    run_run(&mut run, Some(&progress)).map_err(|e| format!("Run execution failed: {}", e))?;

    Ok(RunSummary::from_run(&run))
}
