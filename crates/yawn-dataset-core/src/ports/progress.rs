//! Progress reporting port for UI integration.

use crate::domain::VideoResult;

/// Events emitted during extraction for progress tracking.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Extraction started for a video.
    VideoStarted {
        /// Path to the video.
        path: String,
        /// Index in the batch (0-based).
        index: usize,
        /// Total videos in batch, if known.
        total: Option<usize>,
    },
    /// A video finished.
    VideoCompleted {
        /// Path to the video.
        path: String,
        /// Counters for the video.
        result: VideoResult,
    },
    /// A video was abandoned after a fatal error.
    VideoFailed {
        /// Path to the video.
        path: String,
        /// Reason for failure.
        reason: String,
    },
    /// All videos have been processed.
    Finished {
        /// Videos completed.
        processed: usize,
        /// Videos abandoned.
        failed: usize,
    },
}

/// Port for receiving progress events.
pub trait ProgressSink: Send + Sync {
    /// Called when a progress event occurs.
    fn on_event(&self, event: ProgressEvent);
}
