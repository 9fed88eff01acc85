//! CSV per-video statistics output.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use yawn_dataset_core::ports::{StatsOutput, VideoStats};

/// Appends one row per video to a CSV file, writing the header on creation.
pub struct CsvStatsOutput {
    path: PathBuf,
}

impl CsvStatsOutput {
    /// Creates an output for `path`. Nothing is written until the first row.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The CSV file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatsOutput for CsvStatsOutput {
    fn record(&self, row: &VideoStats) -> Result<()> {
        let is_new = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row to {}", self.path.display()))?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))
    }
}
