//! Videos, their categories, and per-frame and per-video results.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::DetectorKind;

/// Recording category encoded in a video's file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCategory {
    /// Subject at rest (`-Normal.avi`).
    Normal,
    /// Subject talking (`-Talking.avi`).
    Talking,
    /// Subject yawning (`-Yawning.avi`).
    Yawning,
    /// Subject wearing sunglasses; never processed.
    SunGlasses,
    /// Any other file name; never processed.
    Other,
}

impl VideoCategory {
    /// Derives the category from a file name.
    ///
    /// A name containing `SunGlasses` is excluded regardless of its suffix.
    #[must_use]
    pub fn from_file_name(name: &str) -> Self {
        if name.contains("SunGlasses") {
            Self::SunGlasses
        } else if name.ends_with("-Normal.avi") {
            Self::Normal
        } else if name.ends_with("-Talking.avi") {
            Self::Talking
        } else if name.ends_with("-Yawning.avi") {
            Self::Yawning
        } else {
            Self::Other
        }
    }

    /// True if frames from this category are extracted.
    #[must_use]
    pub const fn is_processable(self) -> bool {
        matches!(self, Self::Normal | Self::Talking | Self::Yawning)
    }

    /// True if the category never contains a genuine yawn, so an open-mouth
    /// verdict is a false positive.
    #[must_use]
    pub const fn expects_closed_mouth(self) -> bool {
        matches!(self, Self::Normal | Self::Talking)
    }
}

/// A video file queued for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
    /// Sequential id, starting at 1.
    pub id: u32,
    /// Path to the video file.
    pub path: PathBuf,
}

impl Video {
    /// Creates a new video entry.
    #[must_use]
    pub fn new(id: u32, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            path: path.into(),
        }
    }

    /// Final path component as a string, or empty if it has none.
    #[must_use]
    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }

    /// Category derived from the file name.
    #[must_use]
    pub fn category(&self) -> VideoCategory {
        VideoCategory::from_file_name(&self.file_name())
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Outcome of classifying one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageResult {
    /// The frame was skipped (invalid face, policy or sampling rejection).
    NotProcessed,
    /// A crop was persisted.
    Processed {
        /// Whether the crop was filed as an open mouth.
        is_opened: bool,
    },
}

impl ImageResult {
    /// True if a crop was persisted.
    #[must_use]
    pub const fn is_processed(self) -> bool {
        matches!(self, Self::Processed { .. })
    }
}

/// Per-video counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VideoResult {
    /// Frames read from the video.
    pub total_frames: u64,
    /// Crops saved while the primary detector was active.
    pub primary_counter: u64,
    /// Crops saved while the SSD detector was active.
    pub ssd_counter: u64,
    /// Crops saved while the `BlazeFace` detector was active.
    pub blazeface_counter: u64,
    /// Crops saved as open mouth.
    pub opened_counter: u64,
    /// Crops saved as closed mouth.
    pub closed_counter: u64,
}

impl VideoResult {
    /// A result with every counter at zero.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Total crops saved for this video.
    #[must_use]
    pub const fn images_saved(&self) -> u64 {
        self.primary_counter + self.ssd_counter + self.blazeface_counter
    }

    /// Records one persisted crop made while `kind` was the active detector.
    pub fn record(&mut self, kind: DetectorKind, is_opened: bool) {
        match kind {
            DetectorKind::Primary => self.primary_counter += 1,
            DetectorKind::Ssd => self.ssd_counter += 1,
            DetectorKind::BlazeFace => self.blazeface_counter += 1,
        }
        if is_opened {
            self.opened_counter += 1;
        } else {
            self.closed_counter += 1;
        }
    }
}
