//! 3D face alignment network.
//!
//! Regresses 68 `(x, y, z)` landmarks from a cropped RGB face using the same
//! depthwise blocks as `BlazeFace`. It is the secondary landmark method of the
//! mouth arbiter, fed only the face crop so it sees no background.

use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{Device, Module, Tensor};
use candle_nn::{conv2d, linear, Conv2d, Conv2dConfig, Linear, VarBuilder};
use image::DynamicImage;

use super::blazeface::{run_chain, BlazeBlock};
use super::landmarks::{crop_face, to_image_points};
use super::utils::rgb_tensor;
use super::{get_device, load_safetensors};
use crate::domain::{FaceRegion, Point, FACE_LANDMARK_COUNT};
use crate::ports::LandmarkPredictor;

/// Side of the square RGB input.
pub const INPUT_SIZE: usize = 128;

/// `(in, out, kernel, stride)`: 64x64 after the stem, 8x8 at the end.
const BACKBONE: [(usize, usize, usize, usize); 8] = [
    (24, 24, 3, 1),
    (24, 32, 3, 2),
    (32, 48, 3, 1),
    (48, 64, 3, 2),
    (64, 96, 3, 1),
    (96, 128, 3, 2),
    (128, 128, 3, 1),
    (128, 128, 3, 1),
];

const FEATURES: usize = 128;

/// Network regressing `(x, y, z)` per landmark, normalized to the input crop.
pub struct FaceAlignNet {
    stem: Conv2d,
    backbone: Vec<BlazeBlock>,
    head: Linear,
}

impl FaceAlignNet {
    /// Builds the network from weights.
    ///
    /// # Errors
    ///
    /// Returns an error if a weight tensor is missing or has the wrong shape.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder) -> Result<Self> {
        let stem = conv2d(
            3,
            24,
            5,
            Conv2dConfig {
                stride: 2,
                ..Conv2dConfig::default()
            },
            vb.pp("stem"),
        )?;
        Ok(Self {
            stem,
            backbone: BlazeBlock::chain(&BACKBONE, &vb, "backbone")?,
            head: linear(FEATURES, FACE_LANDMARK_COUNT * 3, vb.pp("head"))?,
        })
    }
}

impl Module for FaceAlignNet {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let x = x.pad_with_zeros(2, 1, 2)?.pad_with_zeros(3, 1, 2)?;
        let x = self.stem.forward(&x)?.relu()?;
        let x = run_chain(&self.backbone, x)?;
        // Global average pool to (1, FEATURES).
        let x = x.mean(3)?.mean(2)?;
        self.head.forward(&x)
    }
}

/// Secondary landmark predictor backed by [`FaceAlignNet`].
pub struct FaceAlign3d {
    net: FaceAlignNet,
    device: Device,
}

impl FaceAlign3d {
    /// Loads weights from a safetensors file onto the best available device.
    ///
    /// # Errors
    ///
    /// Returns an error if the weights cannot be read or do not fit the network.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let device = get_device();
        let vb = load_safetensors(path, &device)?;
        let net = FaceAlignNet::new(vb)
            .with_context(|| format!("Invalid face alignment weights: {}", path.display()))?;
        Ok(Self { net, device })
    }
}

impl LandmarkPredictor for FaceAlign3d {
    fn name(&self) -> &'static str {
        "face_align3d"
    }

    fn landmarks(&self, image: &DynamicImage, region: FaceRegion) -> Result<Vec<Point>> {
        let (face, rect) = crop_face(image, region)?;
        let input = rgb_tensor(&face, INPUT_SIZE, &self.device)?;
        let output = self
            .net
            .forward(&input)?
            .flatten_all()?
            .to_vec1::<f32>()
            .context("Face alignment inference failed")?;
        Ok(to_image_points(&output, 3, rect))
    }
}
