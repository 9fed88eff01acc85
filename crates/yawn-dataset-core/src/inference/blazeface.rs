//! `BlazeFace` face detector.
//!
//! Front-camera `BlazeFace` network ("`BlazeFace`: Sub-millisecond Neural Face
//! Detection on Mobile GPUs") with weights converted from
//! <https://github.com/hollance/BlazeFace-PyTorch>. Serves as the second DNN
//! detector of the face cascade.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{Device, Module, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};
use image::DynamicImage;
use tracing::trace;

use super::utils::{nms, rgb_tensor, sigmoid, ScoredBox};
use super::{get_device, load_safetensors};
use crate::domain::{DetectorKind, FaceRegion};
use crate::ports::FaceDetector;

/// Input image size for `BlazeFace`.
pub const INPUT_SIZE: usize = 128;

/// Anchors on the 16x16 grid (2 per cell) followed by the 8x8 grid (6 per cell).
const NUM_ANCHORS: usize = 896;
const ANCHORS_16: usize = 512;
const ANCHORS_8: usize = 384;

/// Default confidence threshold for face detection.
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.75;

const NMS_THRESHOLD: f32 = 0.3;

/// `(in, out, kernel, stride)` per block up to the 16x16 feature map.
const BACKBONE_16: [(usize, usize, usize, usize); 11] = [
    (24, 24, 3, 1),
    (24, 28, 3, 1),
    (28, 32, 3, 2),
    (32, 36, 3, 1),
    (36, 42, 3, 1),
    (42, 48, 3, 2),
    (48, 56, 3, 1),
    (56, 64, 3, 1),
    (64, 72, 3, 1),
    (72, 80, 3, 1),
    (80, 88, 3, 1),
];

/// `(in, out, kernel, stride)` per block down to the 8x8 feature map.
const BACKBONE_8: [(usize, usize, usize, usize); 5] = [
    (88, 96, 3, 2),
    (96, 96, 3, 1),
    (96, 96, 3, 1),
    (96, 96, 3, 1),
    (96, 96, 3, 1),
];

/// Depthwise separable residual block.
///
/// Shared with the 3D landmark network. Convolutions carry biases with
/// BatchNorm folded in.
pub(crate) struct BlazeBlock {
    depthwise: Conv2d,
    pointwise: Conv2d,
    channel_pad: usize,
    stride: usize,
}

impl BlazeBlock {
    #[allow(clippy::similar_names)]
    pub(crate) fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        vb: &VarBuilder,
    ) -> Result<Self> {
        // Stride-2 blocks pad asymmetrically in forward() instead.
        let padding = if stride == 2 { 0 } else { (kernel_size - 1) / 2 };
        let depthwise = conv2d(
            in_channels,
            in_channels,
            kernel_size,
            Conv2dConfig {
                stride,
                padding,
                groups: in_channels,
                ..Conv2dConfig::default()
            },
            vb.pp("depthwise"),
        )?;
        let pointwise = conv2d(
            in_channels,
            out_channels,
            1,
            Conv2dConfig::default(),
            vb.pp("pointwise"),
        )?;

        Ok(Self {
            depthwise,
            pointwise,
            channel_pad: out_channels.saturating_sub(in_channels),
            stride,
        })
    }

    /// Builds a chain of blocks named `{prefix}.{i}`.
    pub(crate) fn chain(
        config: &[(usize, usize, usize, usize)],
        vb: &VarBuilder,
        prefix: &str,
    ) -> Result<Vec<Self>> {
        config
            .iter()
            .enumerate()
            .map(|(i, &(in_c, out_c, k, s))| {
                Self::new(in_c, out_c, k, s, &vb.pp(format!("{prefix}.{i}")))
            })
            .collect()
    }
}

impl Module for BlazeBlock {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let (input, residual) = if self.stride == 2 {
            (
                x.pad_with_zeros(2, 0, 2)?.pad_with_zeros(3, 0, 2)?,
                x.max_pool2d(2)?,
            )
        } else {
            (x.clone(), x.clone())
        };

        let h = self.depthwise.forward(&input)?.relu()?;
        let h = self.pointwise.forward(&h)?;

        let residual = if self.channel_pad > 0 {
            residual.pad_with_zeros(1, 0, self.channel_pad)?
        } else {
            residual
        };
        (h + residual)?.relu()
    }
}

/// Runs a sequence of blocks.
pub(crate) fn run_chain(blocks: &[BlazeBlock], x: Tensor) -> candle_core::Result<Tensor> {
    blocks.iter().try_fold(x, |h, block| block.forward(&h))
}

/// `BlazeFace` network.
pub struct BlazeFace {
    conv0: Conv2d,
    backbone1: Vec<BlazeBlock>,
    backbone2: Vec<BlazeBlock>,
    classifier_16: Conv2d,
    regressor_16: Conv2d,
    classifier_8: Conv2d,
    regressor_8: Conv2d,
    anchors: Vec<[f32; 2]>,
    device: Device,
}

impl BlazeFace {
    /// Builds the network from weights.
    ///
    /// # Errors
    ///
    /// Returns an error if a weight tensor is missing or has the wrong shape.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder) -> Result<Self> {
        let conv0 = conv2d(
            3,
            24,
            5,
            Conv2dConfig {
                stride: 2,
                ..Conv2dConfig::default()
            },
            vb.pp("conv0"),
        )?;
        let head = |out: usize, in_c: usize, name: &str| {
            conv2d(in_c, out, 1, Conv2dConfig::default(), vb.pp(name))
        };

        Ok(Self {
            conv0,
            backbone1: BlazeBlock::chain(&BACKBONE_16, &vb, "backbone1")?,
            backbone2: BlazeBlock::chain(&BACKBONE_8, &vb, "backbone2")?,
            classifier_16: head(2, 88, "classifier_16")?,
            regressor_16: head(32, 88, "regressor_16")?,
            classifier_8: head(6, 96, "classifier_8")?,
            regressor_8: head(96, 96, "regressor_8")?,
            anchors: anchor_centers(),
            device: vb.device().clone(),
        })
    }

    /// Returns `(scores [1, 896, 1], boxes [1, 896, 16])` for a `[1, 3, 128, 128]` input.
    fn forward(&self, x: &Tensor) -> Result<(Tensor, Tensor)> {
        let x = x.pad_with_zeros(2, 1, 2)?.pad_with_zeros(3, 1, 2)?;
        let x = self.conv0.forward(&x)?.relu()?;

        let feature_16 = run_chain(&self.backbone1, x)?;
        let feature_8 = run_chain(&self.backbone2, feature_16.clone())?;

        let flatten = |conv: &Conv2d, feature: &Tensor, n: usize, width: usize| {
            conv.forward(feature)?
                .permute((0, 2, 3, 1))?
                .reshape((1, n, width))
        };

        let scores = Tensor::cat(
            &[
                flatten(&self.classifier_16, &feature_16, ANCHORS_16, 1)?,
                flatten(&self.classifier_8, &feature_8, ANCHORS_8, 1)?,
            ],
            1,
        )?;
        let boxes = Tensor::cat(
            &[
                flatten(&self.regressor_16, &feature_16, ANCHORS_16, 16)?,
                flatten(&self.regressor_8, &feature_8, ANCHORS_8, 16)?,
            ],
            1,
        )?;
        Ok((scores, boxes))
    }

    /// Detects faces, returning normalized boxes after NMS.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    pub fn detect(&self, image: &DynamicImage, min_score: f32) -> Result<Vec<ScoredBox>> {
        let input = rgb_tensor(image, INPUT_SIZE, &self.device)?;
        let (scores, boxes) = self.forward(&input)?;
        let scores = scores.squeeze(0)?.to_vec2::<f32>()?;
        let boxes = boxes.squeeze(0)?.to_vec2::<f32>()?;
        Ok(decode(&self.anchors, &scores, &boxes, min_score))
    }
}

/// Anchor centers, with unit width and height.
fn anchor_centers() -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    for (grid, per_cell) in [(16_u8, 2), (8_u8, 6)] {
        let size = f32::from(grid);
        for y in 0..grid {
            for x in 0..grid {
                let center = [(f32::from(x) + 0.5) / size, (f32::from(y) + 0.5) / size];
                anchors.extend(std::iter::repeat(center).take(per_cell));
            }
        }
    }
    anchors
}

/// Turns raw regressor output into suppressed, normalized boxes.
fn decode(
    anchors: &[[f32; 2]],
    scores: &[Vec<f32>],
    boxes: &[Vec<f32>],
    min_score: f32,
) -> Vec<ScoredBox> {
    let scale = INPUT_SIZE as f32;
    let candidates = anchors
        .iter()
        .zip(scores.iter().zip(boxes))
        .filter_map(|(anchor, (score, raw))| {
            let score = sigmoid(*score.first()?);
            if score < min_score || raw.len() < 4 {
                return None;
            }
            let cx = anchor[0] + raw[0] / scale;
            let cy = anchor[1] + raw[1] / scale;
            let (w, h) = (raw[2] / scale, raw[3] / scale);
            Some(ScoredBox {
                bbox: [
                    (cx - w / 2.0).clamp(0.0, 1.0),
                    (cy - h / 2.0).clamp(0.0, 1.0),
                    (cx + w / 2.0).clamp(0.0, 1.0),
                    (cy + h / 2.0).clamp(0.0, 1.0),
                ],
                score,
            })
        })
        .collect();
    nms(candidates, NMS_THRESHOLD)
}

/// Cascade adapter around [`BlazeFace`].
pub struct BlazeFaceDetector {
    model: BlazeFace,
    min_score: f32,
}

impl BlazeFaceDetector {
    /// Loads weights from a safetensors file onto the best available device.
    ///
    /// # Errors
    ///
    /// Returns an error if the weights cannot be read or do not fit the network.
    pub fn load(path: impl AsRef<Path>, min_score: f32) -> Result<Self> {
        let path = path.as_ref();
        let vb = load_safetensors(path, &get_device())?;
        let model = BlazeFace::new(vb)
            .with_context(|| format!("Invalid BlazeFace weights: {}", path.display()))?;
        Ok(Self { model, min_score })
    }
}

impl FaceDetector for BlazeFaceDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::BlazeFace
    }

    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<FaceRegion>> {
        let boxes = self.model.detect(image, self.min_score)?;
        trace!(faces = boxes.len(), "BlazeFace detections");
        Ok(boxes
            .iter()
            .map(|b| b.to_region(image.width(), image.height()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_layout() {
        let anchors = anchor_centers();
        assert_eq!(anchors.len(), NUM_ANCHORS);
        assert_eq!(anchors[0], [0.5 / 16.0, 0.5 / 16.0]);
        assert_eq!(anchors[1], anchors[0]);
        assert_eq!(anchors[ANCHORS_16], [0.5 / 8.0, 0.5 / 8.0]);
        assert_eq!(anchors[NUM_ANCHORS - 1], [7.5 / 8.0, 7.5 / 8.0]);
    }

    #[test]
    fn test_decode_filters_low_scores() {
        let anchors = vec![[0.5, 0.5], [0.25, 0.25]];
        // logit 3.0 -> 0.95, logit -3.0 -> 0.05
        let scores = vec![vec![3.0], vec![-3.0]];
        let boxes = vec![vec![0.0, 0.0, 64.0, 64.0], vec![0.0, 0.0, 32.0, 32.0]];

        let found = decode(&anchors, &scores, &boxes, DEFAULT_SCORE_THRESHOLD);
        assert_eq!(found.len(), 1);
        let bbox = found[0].bbox;
        assert!((bbox[0] - 0.25).abs() < 1e-6);
        assert!((bbox[2] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_decode_clamps_to_unit_square() {
        let anchors = vec![[0.0, 0.0]];
        let scores = vec![vec![5.0]];
        let boxes = vec![vec![0.0, 0.0, 64.0, 64.0]];

        let found = decode(&anchors, &scores, &boxes, 0.5);
        assert_eq!(found[0].bbox, [0.0, 0.0, 0.25, 0.25]);
    }

    #[test]
    fn test_missing_weights_file() {
        assert!(BlazeFaceDetector::load("/nonexistent/blazeface.safetensors", 0.75).is_err());
    }
}
