//! Mouth state, landmark methods and the mouth aspect ratio.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::Point;

/// Number of points produced by a full face landmark predictor.
pub const FACE_LANDMARK_COUNT: usize = 68;

/// Mouth points (outer and inner lips) in the 68-point layout.
pub const MOUTH_POINTS: Range<usize> = 48..68;

/// Outer lip points in the 68-point layout.
pub const LIP_POINTS: Range<usize> = 48..60;

/// Minimum number of ordered lip points the ratio formula indexes into.
const MIN_MOUTH_POINTS: usize = 11;

/// Which landmark technique produced a reported mouth ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkMethod {
    /// 68-point landmark predictor run on the full frame.
    Primary,
    /// 3D landmark predictor run on the cropped face.
    Secondary,
}

impl LandmarkMethod {
    /// Short tag used in output filenames.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl fmt::Display for LandmarkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Reconciled mouth state for one face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouthState {
    /// Whether the mouth is judged open.
    pub is_open: bool,
    /// Reported mouth aspect ratio, rounded to two decimals.
    pub ratio: f32,
    /// Method whose ratio is reported.
    pub method: LandmarkMethod,
}

/// Output class of a persisted crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouthClass {
    /// Mouth open (yawn).
    Opened,
    /// Mouth closed.
    Closed,
}

impl MouthClass {
    /// Class for a mouth-open verdict.
    #[must_use]
    pub const fn from_open(is_open: bool) -> Self {
        if is_open {
            Self::Opened
        } else {
            Self::Closed
        }
    }

    /// Name of the output directory holding this class.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Closed => "closed",
        }
    }
}

/// Errors computing a mouth ratio from landmarks.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LandmarkError {
    /// Predictor returned the wrong number of face points.
    #[error("expected {expected} face landmarks, got {actual}")]
    WrongCount {
        /// Expected point count.
        expected: usize,
        /// Actual point count.
        actual: usize,
    },
    /// Too few mouth points for the ratio formula.
    #[error("mouth aspect ratio needs at least {MIN_MOUTH_POINTS} points, got {0}")]
    TooFewPoints(usize),
    /// Mouth corners coincide.
    #[error("mouth width is zero")]
    ZeroWidth,
    /// A landmark coordinate is NaN or infinite.
    #[error("landmark coordinates are not finite")]
    NonFinite,
}

/// Computes the mouth aspect ratio from ordered outer-lip points.
///
/// Uses the two vertical lip distances (points 2-10 and 4-8) over twice the
/// horizontal width between the corners (points 0-6).
///
/// # Errors
///
/// Returns a [`LandmarkError`] if fewer than 11 points are given, a point is
/// not finite, or the mouth corners coincide.
pub fn mouth_aspect_ratio(mouth: &[Point]) -> Result<f32, LandmarkError> {
    if mouth.len() < MIN_MOUTH_POINTS {
        return Err(LandmarkError::TooFewPoints(mouth.len()));
    }
    if mouth.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(LandmarkError::NonFinite);
    }

    let a = mouth[2].distance(&mouth[10]);
    let b = mouth[4].distance(&mouth[8]);
    let c = mouth[0].distance(&mouth[6]);

    if c <= f32::EPSILON {
        return Err(LandmarkError::ZeroWidth);
    }

    Ok((a + b) / (2.0 * c))
}

/// Rounds a ratio to two decimal places.
#[must_use]
pub fn round_ratio(ratio: f32) -> f32 {
    (ratio * 100.0).round() / 100.0
}
