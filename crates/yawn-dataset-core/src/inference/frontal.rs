//! Frontal face detector on grayscale frames.
//!
//! Wraps the `SeetaFace` funnel-structured cascade from `rustface`. It is the
//! first detector of the cascade and the only one whose regions are used for
//! mouth judgement.

use std::path::Path;

use anyhow::{Context, Result};
use image::DynamicImage;
use rustface::{Detector, ImageData};
use tracing::trace;

use crate::domain::{DetectorKind, FaceRegion};
use crate::ports::FaceDetector;

/// Default smallest face searched for, in pixels.
pub const DEFAULT_MIN_FACE_SIZE: u32 = 40;

const SCORE_THRESHOLD: f64 = 2.0;
const PYRAMID_SCALE_FACTOR: f32 = 0.8;
const SLIDE_WINDOW_STEP: u32 = 4;

/// Frontal detector backed by a `SeetaFace` model file.
pub struct FrontalFaceDetector {
    detector: Box<dyn Detector>,
}

impl FrontalFaceDetector {
    /// Loads the `SeetaFace` model.
    ///
    /// # Errors
    ///
    /// Returns an error if the model file cannot be read.
    pub fn load(path: impl AsRef<Path>, min_face_size: u32) -> Result<Self> {
        let path = path.as_ref();
        let mut detector = rustface::create_detector(&path.to_string_lossy())
            .with_context(|| format!("Failed to load frontal face model: {}", path.display()))?;
        detector.set_min_face_size(min_face_size.max(20));
        detector.set_score_thresh(SCORE_THRESHOLD);
        detector.set_pyramid_scale_factor(PYRAMID_SCALE_FACTOR);
        detector.set_slide_window_step(SLIDE_WINDOW_STEP, SLIDE_WINDOW_STEP);
        Ok(Self { detector })
    }
}

impl FaceDetector for FrontalFaceDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Primary
    }

    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<FaceRegion>> {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        let mut data = ImageData::new(gray.as_raw(), width, height);

        let mut faces = self.detector.detect(&mut data);
        faces.sort_by(|a, b| b.score().total_cmp(&a.score()));
        trace!(faces = faces.len(), "Frontal detections");

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                let right = bbox.x().saturating_add_unsigned(bbox.width());
                let bottom = bbox.y().saturating_add_unsigned(bbox.height());
                FaceRegion::new(bbox.x(), bbox.y(), right, bottom)
            })
            .collect())
    }
}
