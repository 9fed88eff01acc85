//! Single-shot face detector run through `tract`.
//!
//! Expects an ONNX export with one `[1, 3, H, W]` input and two outputs:
//! class scores `[1, N, 2]` (background, face) and corner boxes `[1, N, 4]`
//! normalized to `[0, 1]`. The Ultra-Light-Fast RFB-320 face model has this
//! layout.

#![allow(clippy::cast_possible_truncation)]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::trace;
use tract_onnx::prelude::*;

use super::utils::{nms, ScoredBox};
use crate::domain::{DetectorKind, FaceRegion};
use crate::ports::FaceDetector;

/// Model input width.
pub const INPUT_WIDTH: u32 = 320;
/// Model input height.
pub const INPUT_HEIGHT: u32 = 240;

/// Default minimum face score.
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.7;

const NMS_THRESHOLD: f32 = 0.3;

/// ONNX single-shot face detector.
pub struct SsdFaceDetector {
    model: TypedRunnableModel<TypedModel>,
    min_score: f32,
}

impl SsdFaceDetector {
    /// Loads and optimizes an ONNX model.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be read or does not accept a
    /// `[1, 3, 240, 320]` input.
    pub fn load(path: impl AsRef<Path>, min_score: f32) -> Result<Self> {
        let path = path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("Failed to load ONNX model from {}", path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize),
                ),
            )
            .context("Failed to set input fact")?
            .into_optimized()
            .context("Failed to optimize ONNX model")?
            .into_runnable()
            .context("Failed to build runnable ONNX model")?;
        Ok(Self { model, min_score })
    }

    fn build_input(image: &DynamicImage) -> Tensor {
        let rgb = image
            .resize_exact(INPUT_WIDTH, INPUT_HEIGHT, FilterType::Triangle)
            .to_rgb8();
        tract_ndarray::Array4::from_shape_fn(
            (1, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize),
            |(_, channel, y, x)| {
                let pixel = rgb.get_pixel(x as u32, y as u32);
                (f32::from(pixel[channel]) - 127.0) / 128.0
            },
        )
        .into_tensor()
    }
}

/// Pairs face scores with boxes, keeping those above `min_score`.
fn decode(scores: &[f32], boxes: &[f32], min_score: f32) -> Vec<ScoredBox> {
    let candidates = scores
        .chunks_exact(2)
        .zip(boxes.chunks_exact(4))
        .filter(|(score, _)| score[1] >= min_score)
        .map(|(score, bbox)| ScoredBox {
            bbox: [
                bbox[0].clamp(0.0, 1.0),
                bbox[1].clamp(0.0, 1.0),
                bbox[2].clamp(0.0, 1.0),
                bbox[3].clamp(0.0, 1.0),
            ],
            score: score[1],
        })
        .collect();
    nms(candidates, NMS_THRESHOLD)
}

impl FaceDetector for SsdFaceDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Ssd
    }

    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<FaceRegion>> {
        let input = Self::build_input(image);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        if outputs.len() < 2 {
            return Err(anyhow!(
                "expected scores and boxes, model produced {} outputs",
                outputs.len()
            ));
        }
        let scores = outputs[0]
            .as_slice::<f32>()
            .context("score tensor was not f32")?;
        let boxes = outputs[1]
            .as_slice::<f32>()
            .context("box tensor was not f32")?;

        let found = decode(scores, boxes, self.min_score);
        trace!(faces = found.len(), "SSD detections");
        Ok(found
            .iter()
            .map(|b| b.to_region(image.width(), image.height()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_keeps_confident_faces() {
        let scores = [0.9, 0.1, 0.2, 0.8, 0.05, 0.95];
        let boxes = [
            0.0, 0.0, 0.1, 0.1, //
            0.1, 0.2, 0.5, 0.6, //
            0.6, 0.1, 0.9, 0.5,
        ];
        let found = decode(&scores, &boxes, 0.7);
        assert_eq!(found.len(), 2);
        assert!((found[0].score - 0.95).abs() < 1e-6);
        assert!((found[1].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_decode_clamps_boxes() {
        let found = decode(&[0.0, 1.0], &[-0.2, 0.1, 1.3, 0.9], 0.5);
        assert_eq!(found[0].bbox, [0.0, 0.1, 1.0, 0.9]);
    }

    #[test]
    fn test_input_tensor_shape() {
        let tensor = SsdFaceDetector::build_input(&DynamicImage::new_rgb8(64, 48));
        assert_eq!(tensor.shape(), &[1, 3, 240, 320]);
    }

    #[test]
    fn test_missing_model_file() {
        assert!(SsdFaceDetector::load("/nonexistent/ssd.onnx", 0.7).is_err());
    }
}
