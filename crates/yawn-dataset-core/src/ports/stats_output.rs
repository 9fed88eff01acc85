//! Per-video statistics output port.

use serde::Serialize;

use crate::domain::{Video, VideoResult};

/// One row of per-video statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoStats {
    /// Video id.
    #[serde(rename = "Video id")]
    pub video_id: u32,
    /// Video file name.
    #[serde(rename = "File name")]
    pub file_name: String,
    /// Frames read.
    #[serde(rename = "Total frames")]
    pub total_frames: u64,
    /// Crops saved.
    #[serde(rename = "Image saved")]
    pub images_saved: u64,
    /// Open-mouth crops saved.
    #[serde(rename = "Opened img")]
    pub opened: u64,
    /// Closed-mouth crops saved.
    #[serde(rename = "Closed img")]
    pub closed: u64,
}

impl VideoStats {
    /// Builds the row for a processed video.
    #[must_use]
    pub fn new(video: &Video, result: &VideoResult) -> Self {
        Self {
            video_id: video.id,
            file_name: video.file_name(),
            total_frames: result.total_frames,
            images_saved: result.images_saved(),
            opened: result.opened_counter,
            closed: result.closed_counter,
        }
    }
}

/// Port for recording per-video statistics.
pub trait StatsOutput {
    /// Appends one row.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn record(&self, row: &VideoStats) -> anyhow::Result<()>;
}
