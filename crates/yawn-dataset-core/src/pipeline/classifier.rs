//! Per-frame validation, labeling, throttling and persistence.

use anyhow::Context;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, trace, warn};

use crate::domain::{DetectorKind, FaceRegion, ImageResult, MouthClass, Video};
use crate::ports::CropSink;

use super::arbiter::MouthArbiter;
use super::sampler::{SamplerState, SamplingPolicy};

/// Crop geometry and sampling settings for the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Minimum face crop width and height in pixels.
    pub min_face_size: u32,
    /// Width of persisted crops.
    pub output_width: u32,
    /// Height of persisted crops.
    pub output_height: u32,
    /// Keep color instead of converting crops to grayscale.
    pub color: bool,
    /// Per-class sampling steps.
    pub sampling: SamplingPolicy,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_face_size: 50,
            output_width: 100,
            output_height: 100,
            color: false,
            sampling: SamplingPolicy::default(),
        }
    }
}

/// Everything known about one frame when it is classified.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    /// Source video.
    pub video: &'a Video,
    /// Frame to judge and crop.
    pub frame: &'a DynamicImage,
    /// 1-based frame index within the video.
    pub frame_index: u64,
    /// Detector active in the rotation.
    pub detector: DetectorKind,
    /// Region used for mouth judgement.
    pub primary_region: Option<FaceRegion>,
    /// Region from a DNN detector, preferred for the persisted crop.
    pub secondary_region: Option<FaceRegion>,
}

/// Turns detected faces into labeled, throttled crops on disk.
pub struct FrameClassifier {
    arbiter: MouthArbiter,
    sink: Box<dyn CropSink>,
    config: ClassifierConfig,
    sampler: SamplerState,
}

impl FrameClassifier {
    /// Creates a classifier with fresh sampling counters.
    #[must_use]
    pub fn new(arbiter: MouthArbiter, sink: Box<dyn CropSink>, config: ClassifierConfig) -> Self {
        Self {
            arbiter,
            sink,
            config,
            sampler: SamplerState::default(),
        }
    }

    /// Sampling counters accumulated so far.
    #[must_use]
    pub const fn sampler(&self) -> &SamplerState {
        &self.sampler
    }

    /// True if crops keep their color.
    #[must_use]
    pub const fn is_color(&self) -> bool {
        self.config.color
    }

    /// Classifies one frame and persists its crop if it survives every check.
    ///
    /// # Errors
    ///
    /// Returns an error only if the mouth arbiter fails. Every other
    /// rejection yields [`ImageResult::NotProcessed`].
    pub fn classify(&mut self, ctx: &FrameContext<'_>) -> anyhow::Result<ImageResult> {
        let (width, height) = (ctx.frame.width(), ctx.frame.height());

        let Some(region) = ctx.primary_region else {
            debug!(frame = ctx.frame_index, "No face region. Skip");
            return Ok(ImageResult::NotProcessed);
        };
        let primary_rect = match region.crop_rect(width, height, self.config.min_face_size) {
            Ok(rect) => rect,
            Err(reason) => {
                debug!(frame = ctx.frame_index, "{reason}. Skip");
                return Ok(ImageResult::NotProcessed);
            }
        };

        let state = self.arbiter.judge(ctx.frame, region).with_context(|| {
            format!(
                "judging mouth in frame {} of {}",
                ctx.frame_index,
                ctx.video.path.display()
            )
        })?;

        if state.is_open && ctx.video.category().expects_closed_mouth() {
            trace!(
                frame = ctx.frame_index,
                "Open mouth in a no-yawn video. Skip"
            );
            return Ok(ImageResult::NotProcessed);
        }

        let (rect, tag) = ctx
            .secondary_region
            .and_then(|r| r.crop_rect(width, height, 1).ok())
            .map_or((primary_rect, DetectorKind::Primary.tag()), |rect| {
                (rect, ctx.detector.tag())
            });

        let class = MouthClass::from_open(state.is_open);
        let Some(read_index) = self.sampler.admit(class, &self.config.sampling) else {
            return Ok(ImageResult::NotProcessed);
        };

        let crop = ctx.frame.crop_imm(rect.x, rect.y, rect.width, rect.height);
        let crop = if self.config.color {
            crop
        } else {
            DynamicImage::ImageLuma8(crop.to_luma8())
        };
        let crop = crop.resize_exact(
            self.config.output_width,
            self.config.output_height,
            FilterType::Triangle,
        );

        let file_name = format!(
            "{read_index}_{:.2}_{}_{}_{tag}_{}.jpg",
            state.ratio,
            ctx.video.id,
            ctx.frame_index,
            state.method.tag()
        );
        if let Err(e) = self.sink.save(class, &file_name, &crop) {
            warn!("Failed to save {file_name}: {e:#}");
            return Ok(ImageResult::NotProcessed);
        }
        self.sampler.mark_saved(class);
        debug!(file = %file_name, class = class.dir_name(), "Saved crop");

        Ok(ImageResult::Processed {
            is_opened: state.is_open,
        })
    }
}
