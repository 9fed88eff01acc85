//! Frame iteration and detector rotation for one video.

use anyhow::Context;
use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::domain::{DetectorKind, ImageResult, Video, VideoResult};
use crate::ports::{
    FrameRead, FrameSource, ProgressEvent, ProgressSink, StatsOutput, VideoOpener, VideoStats,
};

use super::cascade::FaceCascade;
use super::classifier::{FrameClassifier, FrameContext};
use super::sampler::SamplerState;

/// Which detector supplies the crop for the next classified frame.
///
/// Starts at the primary detector for every video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorRotation {
    current: DetectorKind,
}

impl Default for DetectorRotation {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorRotation {
    /// Rotation positioned at the primary detector.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: DetectorKind::Primary,
        }
    }

    /// The active detector.
    #[must_use]
    pub const fn current(&self) -> DetectorKind {
        self.current
    }

    /// Moves to the next detector, wrapping around.
    pub fn advance(&mut self) {
        self.current = self.current.next_in_cycle();
    }
}

/// Totals of a run over many videos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Videos walked to the end, filtered and unopenable ones included.
    pub processed: usize,
    /// Videos abandoned after a mouth judgement failure.
    pub failed: usize,
    /// Frames read across all videos.
    pub total_frames: u64,
    /// Open-mouth crops saved during the run.
    pub saved_opened: u64,
    /// Closed-mouth crops saved during the run.
    pub saved_closed: u64,
}

impl RunSummary {
    /// Crops saved in both classes.
    #[must_use]
    pub const fn saved(&self) -> u64 {
        self.saved_opened + self.saved_closed
    }
}

/// Walks videos frame by frame, feeding faces to the classifier.
pub struct VideoWalker {
    opener: Box<dyn VideoOpener>,
    cascade: FaceCascade,
    classifier: FrameClassifier,
}

impl VideoWalker {
    /// Creates a walker from its collaborators.
    #[must_use]
    pub fn new(
        opener: Box<dyn VideoOpener>,
        cascade: FaceCascade,
        classifier: FrameClassifier,
    ) -> Self {
        Self {
            opener,
            cascade,
            classifier,
        }
    }

    /// Run-wide sampling counters.
    #[must_use]
    pub const fn sampler(&self) -> &SamplerState {
        self.classifier.sampler()
    }

    /// Extracts crops from every video in order.
    ///
    /// Each finished video gets a stats row. A video whose mouth judgement
    /// fails is reported through `progress`, gets no row, and the run moves
    /// on to the next one. Saved totals come from the run-wide sampler.
    pub fn process_all(
        &mut self,
        videos: &[Video],
        stats: &dyn StatsOutput,
        progress: &dyn ProgressSink,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        for (index, video) in videos.iter().enumerate() {
            let path = video.path.display().to_string();
            progress.on_event(ProgressEvent::VideoStarted {
                path: path.clone(),
                index,
                total: Some(videos.len()),
            });

            match self.process_video(video) {
                Ok(result) => {
                    if let Err(e) = stats.record(&VideoStats::new(video, &result)) {
                        warn!("Failed to record stats for {}: {e:#}", video.file_name());
                    }
                    summary.processed += 1;
                    summary.total_frames += result.total_frames;
                    progress.on_event(ProgressEvent::VideoCompleted { path, result });
                }
                Err(e) => {
                    warn!("Abandoning {path}: {e:#}");
                    summary.failed += 1;
                    progress.on_event(ProgressEvent::VideoFailed {
                        path,
                        reason: format!("{e:#}"),
                    });
                }
            }
        }

        let sampler = self.sampler();
        summary.saved_opened = sampler.open_saved;
        summary.saved_closed = sampler.closed_saved;

        progress.on_event(ProgressEvent::Finished {
            processed: summary.processed,
            failed: summary.failed,
        });
        summary
    }

    /// Extracts crops from one video.
    ///
    /// Videos outside the processable categories and videos that cannot be
    /// opened yield an empty result.
    ///
    /// # Errors
    ///
    /// Returns an error if mouth judgement fails on a frame. The video is
    /// released before returning.
    pub fn process_video(&mut self, video: &Video) -> anyhow::Result<VideoResult> {
        let name = video.file_name();
        if !video.category().is_processable() {
            info!(video = %name, "Video should not be processed");
            return Ok(VideoResult::empty());
        }

        let mut source = match self.opener.open(&video.path) {
            Ok(source) => source,
            Err(e) => {
                info!(video = %name, "Video is not opened: {e:#}");
                return Ok(VideoResult::empty());
            }
        };

        let walked = self.walk_frames(video, source.as_mut());

        if let Err(e) = source.release() {
            warn!(video = %name, "Failed to release video: {e:#}");
        }

        let result = walked?;
        info!(
            video = %name,
            total = result.images_saved(),
            primary = result.primary_counter,
            ssd = result.ssd_counter,
            blazeface = result.blazeface_counter,
            "Video done"
        );
        Ok(result)
    }

    fn walk_frames(
        &mut self,
        video: &Video,
        source: &mut dyn FrameSource,
    ) -> anyhow::Result<VideoResult> {
        let mut result = VideoResult::empty();
        let mut rotation = DetectorRotation::new();
        let color = self.classifier.is_color();

        loop {
            let frame = match source.read() {
                Ok(FrameRead::Frame(frame)) => frame,
                Ok(FrameRead::Degenerate) => {
                    debug!("Empty image. Skip");
                    continue;
                }
                Ok(FrameRead::EndOfStream) => {
                    debug!("No images left in {}", video.path.display());
                    break;
                }
                Err(e) => {
                    warn!("Decode failed in {}: {e:#}", video.path.display());
                    break;
                }
            };

            result.total_frames += 1;
            let frame_index = result.total_frames;

            let (faces, _) = self.cascade.detect(&frame);
            let Some(&primary_region) = faces.first() else {
                continue;
            };

            let recognize = if color {
                frame.clone()
            } else {
                DynamicImage::ImageLuma8(frame.to_luma8())
            };

            let kind = rotation.current();
            let secondary_region = if kind == DetectorKind::Primary {
                None
            } else {
                let dnn_faces = self.cascade.detect_with(kind, &frame);
                let Some(&region) = dnn_faces.first() else {
                    info!(frame = frame_index, "Face not found with {kind}");
                    rotation.advance();
                    continue;
                };
                Some(region)
            };

            // At most one crop per frame: after a DNN-sourced classification
            // the next detector waits for the next frame.
            let ctx = FrameContext {
                video,
                frame: &recognize,
                frame_index,
                detector: kind,
                primary_region: Some(primary_region),
                secondary_region,
            };
            let image = self
                .classifier
                .classify(&ctx)
                .with_context(|| format!("classifying {}", video.file_name()))?;

            if let ImageResult::Processed { is_opened } = image {
                result.record(kind, is_opened);
                rotation.advance();
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_starts_at_primary() {
        assert_eq!(DetectorRotation::new().current(), DetectorKind::Primary);
        assert_eq!(DetectorRotation::default(), DetectorRotation::new());
    }

    #[test]
    fn test_rotation_advances_round_robin() {
        let mut rotation = DetectorRotation::new();
        let mut seen = Vec::new();
        for _ in 0..4 {
            rotation.advance();
            seen.push(rotation.current());
        }
        assert_eq!(
            seen,
            [
                DetectorKind::Ssd,
                DetectorKind::BlazeFace,
                DetectorKind::Primary,
                DetectorKind::Ssd
            ]
        );
    }
}
