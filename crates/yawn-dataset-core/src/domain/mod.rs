//! Core domain types for mouth-state dataset extraction.

mod mouth;
mod region;
mod video;

pub use mouth::{
    mouth_aspect_ratio, round_ratio, LandmarkError, LandmarkMethod, MouthClass, MouthState,
    FACE_LANDMARK_COUNT, LIP_POINTS, MOUTH_POINTS,
};
pub use region::{CropRect, DetectorKind, FaceRegion, Point, RegionRejection};
pub use video::{ImageResult, Video, VideoCategory, VideoResult};
