//! ML inference adapters for the face cascade and the mouth arbiter.
//!
//! Provides:
//! - a `SeetaFace` frontal detector (`rustface`)
//! - a single-shot ONNX face detector (`tract`)
//! - `BlazeFace` (candle)
//! - a 68-point landmark regressor and a 3D face alignment net (candle)

mod blazeface;
mod device;
mod face_align;
mod frontal;
mod landmarks;
mod loader;
mod ssd;
mod utils;

pub use blazeface::{BlazeFace, BlazeFaceDetector};
pub use device::get_device;
pub use face_align::{FaceAlign3d, FaceAlignNet};
pub use frontal::FrontalFaceDetector;
pub use landmarks::{LandmarkNet, Landmarks68};
pub use loader::load_safetensors;
pub use ssd::SsdFaceDetector;
pub use utils::{iou, nms, sigmoid, ScoredBox};

/// Default score thresholds and sizes for each detector.
pub mod defaults {
    pub use super::blazeface::DEFAULT_SCORE_THRESHOLD as BLAZEFACE_SCORE_THRESHOLD;
    pub use super::frontal::DEFAULT_MIN_FACE_SIZE as FRONTAL_MIN_FACE_SIZE;
    pub use super::ssd::DEFAULT_SCORE_THRESHOLD as SSD_SCORE_THRESHOLD;
}
