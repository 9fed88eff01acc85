//! Face detector port.

use image::DynamicImage;

use crate::domain::{DetectorKind, FaceRegion};

/// Port for a face detector producing rectangles in frame coordinates.
///
/// Detectors take `&mut self` because some backends keep scratch buffers
/// between calls.
pub trait FaceDetector {
    /// Which cascade slot this detector fills.
    fn kind(&self) -> DetectorKind;

    /// Detects faces in a frame, most confident first.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn detect(&mut self, image: &DynamicImage) -> anyhow::Result<Vec<FaceRegion>>;
}
