//! Landmark predictor port.

use image::DynamicImage;

use crate::domain::{FaceRegion, Point};

/// Port for a 68-point face landmark predictor.
pub trait LandmarkPredictor {
    /// Human-readable predictor name, used in logs.
    fn name(&self) -> &'static str;

    /// Predicts 68 landmarks for the face inside `region`.
    ///
    /// Points are returned in `image` pixel coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error if the region cannot be fed to the model or
    /// inference fails.
    fn landmarks(&self, image: &DynamicImage, region: FaceRegion) -> anyhow::Result<Vec<Point>>;
}
