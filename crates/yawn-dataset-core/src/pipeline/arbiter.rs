//! Dual-landmark mouth state judgement.

use std::ops::Range;

use anyhow::Context;
use image::DynamicImage;
use tracing::trace;

use crate::domain::{
    mouth_aspect_ratio, round_ratio, FaceRegion, LandmarkError, LandmarkMethod, MouthState, Point,
    FACE_LANDMARK_COUNT, LIP_POINTS, MOUTH_POINTS,
};
use crate::ports::LandmarkPredictor;

/// Thresholds above which a mouth ratio counts as open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArbiterConfig {
    /// Threshold for the 68-point predictor.
    pub primary_threshold: f32,
    /// Threshold for the 3D predictor.
    pub secondary_threshold: f32,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            primary_threshold: 0.6,
            secondary_threshold: 0.75,
        }
    }
}

/// One method's verdict: rounded ratio and whether it clears the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MethodVerdict {
    /// Whether the ratio reaches the method's threshold.
    pub is_open: bool,
    /// Mouth aspect ratio rounded to two decimals.
    pub ratio: f32,
}

impl MethodVerdict {
    fn from_ratio(ratio: f32, threshold: f32) -> Self {
        let ratio = round_ratio(ratio);
        Self {
            is_open: ratio >= threshold,
            ratio,
        }
    }
}

/// Combines two verdicts into the reported mouth state.
///
/// When both methods agree the primary ratio is reported. When they
/// disagree the secondary verdict and ratio win.
#[must_use]
pub fn reconcile(primary: MethodVerdict, secondary: MethodVerdict) -> MouthState {
    if primary.is_open == secondary.is_open {
        MouthState {
            is_open: secondary.is_open,
            ratio: primary.ratio,
            method: LandmarkMethod::Primary,
        }
    } else {
        MouthState {
            is_open: secondary.is_open,
            ratio: secondary.ratio,
            method: LandmarkMethod::Secondary,
        }
    }
}

/// Judges mouth state from two independent landmark predictors.
pub struct MouthArbiter {
    primary: Box<dyn LandmarkPredictor>,
    secondary: Box<dyn LandmarkPredictor>,
    config: ArbiterConfig,
}

impl MouthArbiter {
    /// Creates an arbiter from the full-frame and cropped-face predictors.
    #[must_use]
    pub fn new(
        primary: Box<dyn LandmarkPredictor>,
        secondary: Box<dyn LandmarkPredictor>,
        config: ArbiterConfig,
    ) -> Self {
        Self {
            primary,
            secondary,
            config,
        }
    }

    /// Judges the mouth of the face inside `region`.
    ///
    /// The primary predictor sees the whole frame restricted to `region`;
    /// the secondary predictor sees only the cropped face.
    ///
    /// # Errors
    ///
    /// Returns an error if either predictor fails or yields landmarks the
    /// mouth ratio cannot be computed from. These failures are never
    /// defaulted to a label.
    pub fn judge(&self, frame: &DynamicImage, region: FaceRegion) -> anyhow::Result<MouthState> {
        let region = region.clamped();

        let points = self
            .primary
            .landmarks(frame, region)
            .with_context(|| format!("{} landmarks failed for {region:?}", self.primary.name()))?;
        let primary_ratio = ratio_of(&points, MOUTH_POINTS)
            .with_context(|| format!("{} mouth ratio", self.primary.name()))?;

        let rect = region
            .crop_rect(frame.width(), frame.height(), 1)
            .with_context(|| format!("cannot crop face {region:?}"))?;
        let face = frame.crop_imm(rect.x, rect.y, rect.width, rect.height);
        let points = self
            .secondary
            .landmarks(&face, FaceRegion::covering(face.width(), face.height()))
            .with_context(|| format!("{} landmarks failed", self.secondary.name()))?;
        let secondary_ratio = ratio_of(&points, LIP_POINTS)
            .with_context(|| format!("{} mouth ratio", self.secondary.name()))?;

        let primary = MethodVerdict::from_ratio(primary_ratio, self.config.primary_threshold);
        let secondary = MethodVerdict::from_ratio(secondary_ratio, self.config.secondary_threshold);
        trace!(
            primary = primary.ratio,
            secondary = secondary.ratio,
            "Mouth ratios"
        );

        Ok(reconcile(primary, secondary))
    }
}

fn ratio_of(points: &[Point], range: Range<usize>) -> Result<f32, LandmarkError> {
    if points.len() != FACE_LANDMARK_COUNT {
        return Err(LandmarkError::WrongCount {
            expected: FACE_LANDMARK_COUNT,
            actual: points.len(),
        });
    }
    mouth_aspect_ratio(&points[range])
}
