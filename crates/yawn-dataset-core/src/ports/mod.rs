//! Port definitions for hexagonal architecture.
//!
//! These traits define the boundaries between the extraction pipeline and
//! external adapters (decoders, detectors, landmark models, writers).

mod crop_sink;
mod face_detector;
mod frame_source;
mod landmarks;
mod progress;
mod stats_output;

pub use crop_sink::CropSink;
pub use face_detector::FaceDetector;
pub use frame_source::{FrameRead, FrameSource, VideoOpener};
pub use landmarks::LandmarkPredictor;
pub use progress::{ProgressEvent, ProgressSink};
pub use stats_output::{StatsOutput, VideoStats};
