//! Yawn Dataset Adapters - External adapters for yawn-dataset.
//!
//! This crate provides adapters for:
//! - Filesystem video discovery
//! - JPEG crop output and CSV statistics
//! - Model downloading and caching
//! - FFmpeg video decoding (feature `ffmpeg`)

pub mod crops;
pub mod fs;
pub mod models;
pub mod stats;
#[cfg(feature = "ffmpeg")]
pub mod video;

pub use crops::FsCropSink;
pub use fs::FsVideoSource;
pub use models::{model_path, models_dir, require_model, set_models_dir};
pub use stats::CsvStatsOutput;
#[cfg(feature = "ffmpeg")]
pub use video::FfmpegVideoOpener;
