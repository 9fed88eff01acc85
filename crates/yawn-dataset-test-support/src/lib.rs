//! Test support utilities for yawn-dataset.
//!
//! Provides mocks for every pipeline port and builders for synthetic frames,
//! videos and landmarks.
//!
//! # Example
//!
//! ```
//! use yawn_dataset_core::domain::DetectorKind;
//! use yawn_dataset_test_support::{MockFaceDetector, MockVideoOpener, SyntheticVideo};
//!
//! let frames = SyntheticVideo::new(10).faces_at(&[3, 7]).build();
//! let opener = MockVideoOpener::new().with_video("1-Female-Yawning.avi", frames);
//! let detector = MockFaceDetector::bright_regions(DetectorKind::Primary);
//! ```

mod builders;
mod mocks;

pub use builders::{landmarks_with_ratio, SyntheticFrameBuilder, SyntheticVideo};
pub use mocks::{
    MockCropSink, MockFaceDetector, MockFrameSource, MockLandmarkPredictor, MockProgressSink,
    MockStatsOutput, MockVideoOpener, SavedCrop,
};
