//! Shared inference utilities.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use image::imageops::FilterType;
use image::DynamicImage;

use crate::domain::FaceRegion;

/// Sigmoid activation function.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// A scored box `[x_min, y_min, x_max, y_max]` in normalized `[0,1]` coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredBox {
    /// Box corners.
    pub bbox: [f32; 4],
    /// Detection confidence.
    pub score: f32,
}

impl ScoredBox {
    /// Scales the normalized box to a pixel region in a `width` x `height` frame.
    #[must_use]
    pub fn to_region(&self, width: u32, height: u32) -> FaceRegion {
        let (w, h) = (width as f32, height as f32);
        FaceRegion::new(
            (self.bbox[0] * w) as i32,
            (self.bbox[1] * h) as i32,
            (self.bbox[2] * w) as i32,
            (self.bbox[3] * h) as i32,
        )
    }
}

/// Intersection over Union for two bounding boxes.
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);

    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Greedy non-maximum suppression, highest score first.
pub fn nms(mut boxes: Vec<ScoredBox>, threshold: f32) -> Vec<ScoredBox> {
    boxes.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<ScoredBox> = Vec::new();
    for candidate in boxes {
        if keep.iter().all(|k| iou(&k.bbox, &candidate.bbox) < threshold) {
            keep.push(candidate);
        }
    }
    keep
}

/// Resizes a grayscale copy of `image` into a `(1, 1, size, size)` tensor scaled to `[0, 1]`.
///
/// # Errors
///
/// Returns an error if tensor creation fails.
pub fn gray_tensor(image: &DynamicImage, size: usize, device: &Device) -> Result<Tensor> {
    let resized = image
        .resize_exact(size as u32, size as u32, FilterType::Triangle)
        .to_luma8();
    let data: Vec<f32> = resized.pixels().map(|p| f32::from(p[0]) / 255.0).collect();
    Tensor::from_vec(data, (1, 1, size, size), device).context("Failed to build input tensor")
}

/// Resizes `image` into a `(1, 3, size, size)` RGB tensor normalized to `[-1, 1]`.
///
/// # Errors
///
/// Returns an error if tensor creation fails.
pub fn rgb_tensor(image: &DynamicImage, size: usize, device: &Device) -> Result<Tensor> {
    let resized = image
        .resize_exact(size as u32, size as u32, FilterType::Triangle)
        .to_rgb8();
    let data: Vec<f32> = resized
        .pixels()
        .flat_map(|p| p.0.map(|c| f32::from(c) / 127.5 - 1.0))
        .collect();
    Tensor::from_vec(data, (1, size, size, 3), device)?
        .permute((0, 3, 1, 2))?
        .contiguous()
        .context("Failed to build input tensor")
}
