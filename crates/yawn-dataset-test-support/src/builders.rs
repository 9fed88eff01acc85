//! Synthetic frame, video and landmark builders for testing.

#![allow(clippy::cast_precision_loss)]

use image::{DynamicImage, Rgb, RgbImage};
use yawn_dataset_core::domain::{FaceRegion, Point, FACE_LANDMARK_COUNT};
use yawn_dataset_core::ports::FrameRead;

/// Builder for synthetic video frames.
///
/// Faces are drawn as white rectangles on a black background, which
/// [`crate::MockFaceDetector::bright_regions`] finds again exactly.
pub struct SyntheticFrameBuilder;

impl SyntheticFrameBuilder {
    /// A black frame with no face.
    #[must_use]
    pub fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
    }

    /// A black frame with a white face covering `region`.
    #[must_use]
    pub fn with_face(width: u32, height: u32, region: FaceRegion) -> DynamicImage {
        let inside = |x: u32, y: u32| {
            let (x, y) = (i64::from(x), i64::from(y));
            x >= i64::from(region.start_x)
                && x < i64::from(region.end_x)
                && y >= i64::from(region.start_y)
                && y < i64::from(region.end_y)
        };
        let img = RgbImage::from_fn(width, height, |x, y| {
            if inside(x, y) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        DynamicImage::ImageRgb8(img)
    }
}

/// Builder for in-memory videos consumed by [`crate::MockVideoOpener`].
pub struct SyntheticVideo {
    width: u32,
    height: u32,
    frames: usize,
    face: FaceRegion,
    face_frames: Vec<usize>,
    degenerate_frames: Vec<usize>,
}

impl SyntheticVideo {
    /// A 320x240 video of `frames` blank frames.
    #[must_use]
    pub fn new(frames: usize) -> Self {
        Self {
            width: 320,
            height: 240,
            frames,
            face: FaceRegion::new(100, 60, 200, 180),
            face_frames: Vec::new(),
            degenerate_frames: Vec::new(),
        }
    }

    /// Sets the frame size.
    #[must_use]
    pub const fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Sets where faces are drawn.
    #[must_use]
    pub const fn face_region(mut self, region: FaceRegion) -> Self {
        self.face = region;
        self
    }

    /// Draws a face on the given 1-based frame numbers.
    #[must_use]
    pub fn faces_at(mut self, frames: &[usize]) -> Self {
        self.face_frames.extend_from_slice(frames);
        self
    }

    /// Inserts an undecodable frame before the given 1-based frame numbers.
    #[must_use]
    pub fn degenerate_before(mut self, frames: &[usize]) -> Self {
        self.degenerate_frames.extend_from_slice(frames);
        self
    }

    /// Materializes the reads in order.
    #[must_use]
    pub fn build(self) -> Vec<FrameRead> {
        let mut reads = Vec::with_capacity(self.frames + self.degenerate_frames.len());
        for n in 1..=self.frames {
            if self.degenerate_frames.contains(&n) {
                reads.push(FrameRead::Degenerate);
            }
            let frame = if self.face_frames.contains(&n) {
                SyntheticFrameBuilder::with_face(self.width, self.height, self.face)
            } else {
                SyntheticFrameBuilder::blank(self.width, self.height)
            };
            reads.push(FrameRead::Frame(frame));
        }
        reads
    }
}

/// 68 landmarks inside `region` whose mouth has aspect ratio `ratio`.
///
/// The mouth sits centered in the lower third of the region. Both the
/// 20-point mouth slice and the 12-point outer-lip slice yield `ratio`.
#[must_use]
pub fn landmarks_with_ratio(ratio: f32, region: FaceRegion) -> Vec<Point> {
    let (x0, y0) = (region.start_x as f32, region.start_y as f32);
    let (w, h) = (region.width() as f32, region.height() as f32);

    let cx = x0 + w / 2.0;
    let cy = y0 + h * 0.75;
    let mouth_w = (w / 2.0).max(1.0);
    let gap = ratio * mouth_w;

    let left = Point::new(cx - mouth_w / 2.0, cy);
    let right = Point::new(cx + mouth_w / 2.0, cy);
    let top = |dx: f32| Point::new(cx + dx, cy - gap / 2.0);
    let bottom = |dx: f32| Point::new(cx + dx, cy + gap / 2.0);
    let q = mouth_w / 4.0;

    // Outer lip clockwise from the left corner, then the inner lip.
    let outer = [
        left,
        top(-1.5 * q),
        top(-q),
        top(0.0),
        top(q),
        top(1.5 * q),
        right,
        bottom(1.5 * q),
        bottom(q),
        bottom(0.0),
        bottom(-q),
        bottom(-1.5 * q),
    ];
    let inner = [
        Point::new(cx - q, cy),
        top(-q / 2.0),
        top(0.0),
        top(q / 2.0),
        Point::new(cx + q, cy),
        bottom(q / 2.0),
        bottom(0.0),
        bottom(-q / 2.0),
    ];

    let mut points: Vec<Point> = (0..48)
        .map(|i| {
            let t = i as f32 / 47.0;
            Point::new(x0 + w * t, y0 + h * 0.4)
        })
        .collect();
    points.extend(outer);
    points.extend(inner);
    debug_assert_eq!(points.len(), FACE_LANDMARK_COUNT);
    points
}
