//! 68-point face landmark regressor.
//!
//! A small CNN that takes a grayscale face crop and regresses the iBUG
//! 68-point layout as coordinates normalized to the crop. This is the
//! primary landmark method of the mouth arbiter.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{Device, Module, Tensor};
use candle_nn::{conv2d, linear, Conv2d, Conv2dConfig, Linear, VarBuilder};
use image::DynamicImage;

use super::utils::gray_tensor;
use super::{get_device, load_safetensors};
use crate::domain::{CropRect, FaceRegion, Point, FACE_LANDMARK_COUNT};
use crate::ports::LandmarkPredictor;

/// Side of the square grayscale input.
pub const INPUT_SIZE: usize = 96;

/// Three 2x2 pools: 96 -> 48 -> 24 -> 12.
const FEATURE_SIZE: usize = INPUT_SIZE / 8;

/// 68-point landmark network.
///
/// Architecture: 3 conv layers with max pooling, then 2 FC layers producing
/// 136 values (x0, y0, x1, y1, ...).
pub struct LandmarkNet {
    conv1: Conv2d,
    conv2: Conv2d,
    conv3: Conv2d,
    fc1: Linear,
    fc2: Linear,
}

impl LandmarkNet {
    /// Builds the network from weights.
    ///
    /// # Errors
    ///
    /// Returns an error if a weight tensor is missing or has the wrong shape.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder) -> Result<Self> {
        let same = Conv2dConfig {
            padding: 1,
            ..Conv2dConfig::default()
        };
        Ok(Self {
            conv1: conv2d(1, 32, 3, same, vb.pp("conv1"))?,
            conv2: conv2d(32, 64, 3, same, vb.pp("conv2"))?,
            conv3: conv2d(64, 128, 3, same, vb.pp("conv3"))?,
            fc1: linear(128 * FEATURE_SIZE * FEATURE_SIZE, 256, vb.pp("fc1"))?,
            fc2: linear(256, FACE_LANDMARK_COUNT * 2, vb.pp("fc2"))?,
        })
    }
}

impl Module for LandmarkNet {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let x = self.conv1.forward(x)?.relu()?.max_pool2d(2)?;
        let x = self.conv2.forward(&x)?.relu()?.max_pool2d(2)?;
        let x = self.conv3.forward(&x)?.relu()?.max_pool2d(2)?;
        let x = x.flatten_from(1)?;
        let x = self.fc1.forward(&x)?.relu()?;
        self.fc2.forward(&x)
    }
}

/// Crops `region` out of `image`, truncating at the borders.
pub(crate) fn crop_face(
    image: &DynamicImage,
    region: FaceRegion,
) -> Result<(DynamicImage, CropRect)> {
    let rect = region
        .crop_rect(image.width(), image.height(), 1)
        .with_context(|| format!("Face region {region:?} does not fit the image"))?;
    Ok((image.crop_imm(rect.x, rect.y, rect.width, rect.height), rect))
}

/// Maps `(x, y)` pairs normalized to `rect` back to image coordinates.
pub(crate) fn to_image_points(values: &[f32], stride: usize, rect: CropRect) -> Vec<Point> {
    values
        .chunks_exact(stride)
        .map(|v| {
            Point::new(
                rect.x as f32 + v[0] * rect.width as f32,
                rect.y as f32 + v[1] * rect.height as f32,
            )
        })
        .collect()
}

/// Primary landmark predictor backed by [`LandmarkNet`].
pub struct Landmarks68 {
    net: LandmarkNet,
    device: Device,
}

impl Landmarks68 {
    /// Loads weights from a safetensors file onto the best available device.
    ///
    /// # Errors
    ///
    /// Returns an error if the weights cannot be read or do not fit the network.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let device = get_device();
        let vb = load_safetensors(path, &device)?;
        let net = LandmarkNet::new(vb)
            .with_context(|| format!("Invalid landmark weights: {}", path.display()))?;
        Ok(Self { net, device })
    }
}

impl LandmarkPredictor for Landmarks68 {
    fn name(&self) -> &'static str {
        "landmarks68"
    }

    fn landmarks(&self, image: &DynamicImage, region: FaceRegion) -> Result<Vec<Point>> {
        let (face, rect) = crop_face(image, region)?;
        let input = gray_tensor(&face, INPUT_SIZE, &self.device)?;
        let output = self
            .net
            .forward(&input)?
            .flatten_all()?
            .to_vec1::<f32>()
            .context("Landmark inference failed")?;
        Ok(to_image_points(&output, 2, rect))
    }
}
