//! Run configuration.
//!
//! Everything a run needs is carried in a `RunConfig` value that lives for
//! one run. It can be built in code or loaded from a JSON file:
//!
//! ```json
//! {
//!   "destination": "/home/users/me/icecaps",
//!   "pad_minutes": 120,
//!   "sources": [
//!     { "source": { "kind": "mpl" }, "dir": "/gws/icecaps/mpl/raw" },
//!     { "source": { "kind": "custom", "name": "mmcr-daily",
//!                   "pattern": "%Y%j*.nc.zip", "granularity": "day" },
//!       "dir": "/gws/icecaps/mmcr/mom" }
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::checksums::ChecksumAlgorithm;
use crate::error::EngineError;
use crate::fs_ops;
use crate::model::DataSource;

/// Half-width of the search window when none is given: two hours.
pub const DEFAULT_PAD_MINUTES: i64 = 120;

/// Largest accepted half-width: ten years.
pub const MAX_PAD_MINUTES: i64 = 10 * 366 * 24 * 60;

fn default_pad_minutes() -> i64 {
    DEFAULT_PAD_MINUTES
}

/// A directory of instrument files and the kind of files it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub source: DataSource,
    pub dir: PathBuf,
}

impl SourceSpec {
    pub fn new(source: DataSource, dir: impl Into<PathBuf>) -> Self {
        SourceSpec {
            source,
            dir: dir.into(),
        }
    }
}

/// Configuration for a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Flat directory all files are copied into
    pub destination: PathBuf,

    pub sources: Vec<SourceSpec>,

    /// Window half-width around each anchor
    #[serde(default = "default_pad_minutes")]
    pub pad_minutes: i64,

    /// Verify each copy with this checksum algorithm
    #[serde(default)]
    pub verify: Option<ChecksumAlgorithm>,

    /// Plan and report without copying
    #[serde(default)]
    pub dry_run: bool,
}

impl RunConfig {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        RunConfig {
            destination: destination.into(),
            sources: Vec::new(),
            pad_minutes: DEFAULT_PAD_MINUTES,
            verify: None,
            dry_run: false,
        }
    }

    pub fn with_source(mut self, source: DataSource, dir: impl Into<PathBuf>) -> Self {
        self.sources.push(SourceSpec::new(source, dir));
        self
    }

    /// The window half-width.
    ///
    /// # Errors
    /// Returns `Config` if `pad_minutes` is negative or above [`MAX_PAD_MINUTES`].
    pub fn pad(&self) -> Result<Duration, EngineError> {
        if !(0..=MAX_PAD_MINUTES).contains(&self.pad_minutes) {
            return Err(EngineError::Config {
                message: format!(
                    "pad must be between 0 and {} minutes, got {}",
                    MAX_PAD_MINUTES, self.pad_minutes
                ),
            });
        }
        Ok(Duration::minutes(self.pad_minutes))
    }

    pub fn from_json_str(text: &str) -> Result<Self, EngineError> {
        serde_json::from_str(text).map_err(|e| EngineError::Config {
            message: e.to_string(),
        })
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = fs::read_to_string(path).map_err(|e| EngineError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_json_str(&text)
    }

    /// Check the configuration against the filesystem.
    ///
    /// Every source directory must exist, as must the destination's parent
    /// (the destination itself is created on first copy). Each source's
    /// granularity must not be coarser than its pattern.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.sources.is_empty() {
            return Err(EngineError::Config {
                message: "no sources configured".to_string(),
            });
        }
        self.pad()?;
        if self.destination.as_os_str().is_empty() {
            return Err(EngineError::Config {
                message: "destination path is empty".to_string(),
            });
        }

        for spec in &self.sources {
            let granularity = spec.source.granularity();
            let finest = spec.source.pattern().finest_unit();
            if !granularity.covers(finest) {
                return Err(EngineError::GranularityTooCoarse {
                    granularity,
                    finest,
                });
            }
            fs_ops::require_dir(&spec.dir)?;
        }

        if !self.destination.is_dir() {
            if let Some(parent) = self.destination.parent() {
                if !parent.as_os_str().is_empty() {
                    fs_ops::require_dir(parent)?;
                }
            }
        }

        Ok(())
    }
}
