//! Face rectangles, landmark points and the detector rotation cycle.

#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 2D landmark point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

impl Point {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned face rectangle in frame coordinates.
///
/// Coordinates are signed because detectors may report boxes that start
/// outside the frame. Use [`FaceRegion::clamped`] before cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    /// Left edge (inclusive).
    pub start_x: i32,
    /// Top edge (inclusive).
    pub start_y: i32,
    /// Right edge (exclusive).
    pub end_x: i32,
    /// Bottom edge (exclusive).
    pub end_y: i32,
}

/// A validated crop rectangle inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Why a face region was rejected before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegionRejection {
    /// Start coordinates are not strictly before end coordinates.
    #[error("invalid detection {0:?}")]
    Malformed(FaceRegion),
    /// The region lies entirely outside the frame.
    #[error("cropped face is empty")]
    Empty,
    /// The crop is smaller than the minimum face size.
    #[error("face too small ({width}x{height})")]
    TooSmall {
        /// Crop width in pixels.
        width: u32,
        /// Crop height in pixels.
        height: u32,
    },
}

impl FaceRegion {
    /// Creates a region from corner coordinates.
    #[must_use]
    pub const fn new(start_x: i32, start_y: i32, end_x: i32, end_y: i32) -> Self {
        Self {
            start_x,
            start_y,
            end_x,
            end_y,
        }
    }

    /// Region covering a whole image of the given size.
    #[must_use]
    pub fn covering(width: u32, height: u32) -> Self {
        Self::new(
            0,
            0,
            i32::try_from(width).unwrap_or(i32::MAX),
            i32::try_from(height).unwrap_or(i32::MAX),
        )
    }

    /// Returns a copy with negative start coordinates raised to zero.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            start_x: self.start_x.max(0),
            start_y: self.start_y.max(0),
            ..self
        }
    }

    /// Width of the rectangle (may be negative for malformed regions).
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.end_x - self.start_x
    }

    /// Height of the rectangle (may be negative for malformed regions).
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.end_y - self.start_y
    }

    /// True if start coordinates are strictly before end coordinates.
    #[must_use]
    pub const fn is_well_formed(&self) -> bool {
        self.start_x < self.end_x && self.start_y < self.end_y
    }

    /// Clamps the region and computes the crop it selects from a frame.
    ///
    /// Ends past the frame border are truncated, the same way slicing a
    /// pixel array would behave.
    ///
    /// # Errors
    ///
    /// Returns a [`RegionRejection`] if the region is malformed, selects no
    /// pixels, or yields a crop narrower or shorter than `min_size`.
    pub fn crop_rect(
        self,
        frame_width: u32,
        frame_height: u32,
        min_size: u32,
    ) -> Result<CropRect, RegionRejection> {
        let region = self.clamped();
        if !region.is_well_formed() {
            return Err(RegionRejection::Malformed(self));
        }

        let x = region.start_x as u32;
        let y = region.start_y as u32;
        let end_x = (region.end_x as u32).min(frame_width);
        let end_y = (region.end_y as u32).min(frame_height);
        if x >= end_x || y >= end_y {
            return Err(RegionRejection::Empty);
        }

        let width = end_x - x;
        let height = end_y - y;
        if width < min_size || height < min_size {
            return Err(RegionRejection::TooSmall { width, height });
        }

        Ok(CropRect {
            x,
            y,
            width,
            height,
        })
    }
}

/// The three face detectors, in cascade priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Classic frontal detector on a grayscale frame.
    Primary,
    /// Single-shot DNN detector.
    Ssd,
    /// `BlazeFace` DNN detector.
    BlazeFace,
}

impl DetectorKind {
    /// All kinds in cascade priority order.
    pub const ALL: [Self; 3] = [Self::Primary, Self::Ssd, Self::BlazeFace];

    /// The kind that follows this one in the rotation, wrapping around.
    #[must_use]
    pub const fn next_in_cycle(self) -> Self {
        match self {
            Self::Primary => Self::Ssd,
            Self::Ssd => Self::BlazeFace,
            Self::BlazeFace => Self::Primary,
        }
    }

    /// Short tag used in output filenames.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Ssd => "ssd",
            Self::BlazeFace => "blazeface",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_region_accepted() {
        let crop = FaceRegion::new(10, 20, 110, 140).crop_rect(640, 480, 50);
        assert_eq!(
            crop,
            Ok(CropRect {
                x: 10,
                y: 20,
                width: 100,
                height: 120
            })
        );
    }

    #[test]
    fn test_negative_start_is_clamped() {
        let crop = FaceRegion::new(-30, -5, 70, 80).crop_rect(640, 480, 50);
        assert_eq!(
            crop,
            Ok(CropRect {
                x: 0,
                y: 0,
                width: 70,
                height: 80
            })
        );
    }

    #[test]
    fn test_malformed_region_rejected() {
        let region = FaceRegion::new(100, 10, 100, 90);
        assert_eq!(
            region.crop_rect(640, 480, 50),
            Err(RegionRejection::Malformed(region))
        );

        let region = FaceRegion::new(10, 90, 100, 20);
        assert!(matches!(
            region.crop_rect(640, 480, 50),
            Err(RegionRejection::Malformed(_))
        ));
    }

    #[test]
    fn test_region_fully_clamped_away_is_malformed() {
        // Both edges negative: after clamping start_x (0) >= end_x (-10).
        let region = FaceRegion::new(-50, 0, -10, 100);
        assert!(matches!(
            region.crop_rect(640, 480, 50),
            Err(RegionRejection::Malformed(_))
        ));
    }

    #[test]
    fn test_region_outside_frame_is_empty() {
        let region = FaceRegion::new(700, 10, 800, 100);
        assert_eq!(region.crop_rect(640, 480, 50), Err(RegionRejection::Empty));
    }

    #[test]
    fn test_small_crop_rejected() {
        let region = FaceRegion::new(0, 0, 49, 200);
        assert_eq!(
            region.crop_rect(640, 480, 50),
            Err(RegionRejection::TooSmall {
                width: 49,
                height: 200
            })
        );
    }

    #[test]
    fn test_crop_truncated_at_frame_border() {
        // 60px requested past the right border leaves a 40px crop.
        let region = FaceRegion::new(600, 0, 700, 100);
        assert_eq!(
            region.crop_rect(640, 480, 50),
            Err(RegionRejection::TooSmall {
                width: 40,
                height: 100
            })
        );
    }

    #[test]
    fn test_exactly_min_size_accepted() {
        let region = FaceRegion::new(0, 0, 50, 50);
        assert!(region.crop_rect(50, 50, 50).is_ok());
    }

    #[test]
    fn test_rotation_is_round_robin() {
        let mut kind = DetectorKind::Primary;
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(kind);
            kind = kind.next_in_cycle();
        }
        assert_eq!(
            seen,
            [
                DetectorKind::Primary,
                DetectorKind::Ssd,
                DetectorKind::BlazeFace,
                DetectorKind::Primary,
                DetectorKind::Ssd,
                DetectorKind::BlazeFace,
            ]
        );
    }

    #[test]
    fn test_rotation_matches_modular_index() {
        for (i, kind) in DetectorKind::ALL.iter().enumerate() {
            assert_eq!(kind.next_in_cycle(), DetectorKind::ALL[(i + 1) % 3]);
        }
    }

    #[test]
    fn test_detector_tags() {
        assert_eq!(DetectorKind::Primary.tag(), "primary");
        assert_eq!(DetectorKind::Ssd.to_string(), "ssd");
        assert_eq!(DetectorKind::BlazeFace.tag(), "blazeface");
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < f32::EPSILON);
    }
}
