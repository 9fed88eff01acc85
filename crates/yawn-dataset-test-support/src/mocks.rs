//! Mock implementations of core port traits.
//!
//! Every mock is a cheap handle over shared state, so a test can keep a clone
//! for assertions after boxing the original into the pipeline.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use image::DynamicImage;
use yawn_dataset_core::domain::{DetectorKind, FaceRegion, MouthClass, Point};
use yawn_dataset_core::ports::{
    CropSink, FaceDetector, FrameRead, FrameSource, LandmarkPredictor, ProgressEvent,
    ProgressSink, StatsOutput, VideoOpener, VideoStats,
};

use crate::builders::landmarks_with_ratio;

fn locked<T: Clone>(m: &Mutex<T>) -> T {
    m.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Frame source replaying a fixed list of reads, then end of stream.
pub struct MockFrameSource {
    reads: VecDeque<anyhow::Result<FrameRead>>,
    released: Arc<Mutex<usize>>,
    fail_release: bool,
}

impl FrameSource for MockFrameSource {
    fn read(&mut self) -> anyhow::Result<FrameRead> {
        self.reads.pop_front().unwrap_or(Ok(FrameRead::EndOfStream))
    }

    fn release(&mut self) -> anyhow::Result<()> {
        *self.released.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        if self.fail_release {
            anyhow::bail!("release failed");
        }
        Ok(())
    }
}

/// Video opener serving in-memory frame lists keyed by file name.
///
/// Opening an unknown file fails like an unreadable video.
#[derive(Clone, Default)]
pub struct MockVideoOpener {
    videos: Arc<Mutex<HashMap<String, Vec<FrameRead>>>>,
    decode_errors: Arc<Mutex<HashMap<String, usize>>>,
    opened: Arc<Mutex<Vec<PathBuf>>>,
    released: Arc<Mutex<usize>>,
    fail_release: bool,
}

impl MockVideoOpener {
    /// Creates an opener with no videos.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers frames for a file name.
    #[must_use]
    pub fn with_video(self, file_name: &str, frames: Vec<FrameRead>) -> Self {
        self.videos
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(file_name.to_string(), frames);
        self
    }

    /// Makes the read after `frames` reads of `file_name` fail to decode.
    #[must_use]
    pub fn with_decode_error_after(self, file_name: &str, frames: usize) -> Self {
        self.decode_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(file_name.to_string(), frames);
        self
    }

    /// Makes `release()` fail on every source.
    #[must_use]
    pub fn with_failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    /// Paths passed to `open()`, in order.
    #[must_use]
    pub fn opened(&self) -> Vec<PathBuf> {
        locked(&self.opened)
    }

    /// Number of sources released.
    #[must_use]
    pub fn released(&self) -> usize {
        locked(&self.released)
    }
}

impl VideoOpener for MockVideoOpener {
    fn open(&self, path: &Path) -> anyhow::Result<Box<dyn FrameSource>> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_path_buf());

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(frames) = locked(&self.videos).remove(&name) else {
            anyhow::bail!("cannot open {}", path.display());
        };

        let mut reads: VecDeque<anyhow::Result<FrameRead>> = frames.into_iter().map(Ok).collect();
        if let Some(&after) = locked(&self.decode_errors).get(&name) {
            reads.truncate(after);
            reads.push_back(Err(anyhow::anyhow!("corrupt packet")));
        }

        Ok(Box::new(MockFrameSource {
            reads,
            released: Arc::clone(&self.released),
            fail_release: self.fail_release,
        }))
    }
}

enum DetectorMode {
    Bright,
    Fixed(Vec<FaceRegion>),
    Failing,
}

/// Face detector for synthetic frames.
#[derive(Clone)]
pub struct MockFaceDetector {
    kind: DetectorKind,
    mode: Arc<DetectorMode>,
    calls: Arc<Mutex<usize>>,
}

impl MockFaceDetector {
    fn with_mode(kind: DetectorKind, mode: DetectorMode) -> Self {
        Self {
            kind,
            mode: Arc::new(mode),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Reports the bounding box of all pixels with luma >= 200 as one face.
    #[must_use]
    pub fn bright_regions(kind: DetectorKind) -> Self {
        Self::with_mode(kind, DetectorMode::Bright)
    }

    /// Reports the same regions on every frame.
    #[must_use]
    pub fn fixed(kind: DetectorKind, regions: Vec<FaceRegion>) -> Self {
        Self::with_mode(kind, DetectorMode::Fixed(regions))
    }

    /// Never finds a face.
    #[must_use]
    pub fn blind(kind: DetectorKind) -> Self {
        Self::fixed(kind, Vec::new())
    }

    /// Fails on every frame.
    #[must_use]
    pub fn failing(kind: DetectorKind) -> Self {
        Self::with_mode(kind, DetectorMode::Failing)
    }

    /// Number of `detect()` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        locked(&self.calls)
    }

    /// Boxes a clone for the cascade, keeping this handle for assertions.
    #[must_use]
    pub fn boxed(&self) -> Box<dyn FaceDetector> {
        Box::new(self.clone())
    }
}

fn bright_box(image: &DynamicImage) -> Option<FaceRegion> {
    let gray = image.to_luma8();
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in gray.enumerate_pixels() {
        if pixel[0] >= 200 {
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
    }
    let (x0, y0, x1, y1) = bounds?;
    let coord = |v: u32| i32::try_from(v).unwrap_or(i32::MAX);
    Some(FaceRegion::new(
        coord(x0),
        coord(y0),
        coord(x1 + 1),
        coord(y1 + 1),
    ))
}

impl FaceDetector for MockFaceDetector {
    fn kind(&self) -> DetectorKind {
        self.kind
    }

    fn detect(&mut self, image: &DynamicImage) -> anyhow::Result<Vec<FaceRegion>> {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        match self.mode.as_ref() {
            DetectorMode::Bright => Ok(bright_box(image).into_iter().collect()),
            DetectorMode::Fixed(regions) => Ok(regions.clone()),
            DetectorMode::Failing => anyhow::bail!("{} backend unavailable", self.kind),
        }
    }
}

/// Landmark predictor producing a mouth with a fixed aspect ratio.
#[derive(Clone)]
pub struct MockLandmarkPredictor {
    ratio: Option<f32>,
    fail_width: Option<u32>,
    regions: Arc<Mutex<Vec<FaceRegion>>>,
}

impl MockLandmarkPredictor {
    /// Predicts a mouth whose aspect ratio is `ratio` inside each region.
    #[must_use]
    pub fn with_ratio(ratio: f32) -> Self {
        Self {
            ratio: Some(ratio),
            fail_width: None,
            regions: Arc::default(),
        }
    }

    /// Fails on every call.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            ratio: None,
            fail_width: None,
            regions: Arc::default(),
        }
    }

    /// Fails whenever the input image is `width` pixels wide.
    #[must_use]
    pub const fn failing_on_width(mut self, width: u32) -> Self {
        self.fail_width = Some(width);
        self
    }

    /// Regions passed to `landmarks()`, in order.
    #[must_use]
    pub fn regions(&self) -> Vec<FaceRegion> {
        locked(&self.regions)
    }

    /// Boxes a clone for the arbiter, keeping this handle for assertions.
    #[must_use]
    pub fn boxed(&self) -> Box<dyn LandmarkPredictor> {
        Box::new(self.clone())
    }
}

impl LandmarkPredictor for MockLandmarkPredictor {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn landmarks(&self, image: &DynamicImage, region: FaceRegion) -> anyhow::Result<Vec<Point>> {
        self.regions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(region);
        if self.fail_width == Some(image.width()) {
            anyhow::bail!("landmarks unavailable on {}px frames", image.width());
        }
        match self.ratio {
            Some(ratio) => Ok(landmarks_with_ratio(ratio, region)),
            None => anyhow::bail!("landmarks unavailable for {region:?}"),
        }
    }
}

/// A crop captured by [`MockCropSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedCrop {
    /// Output class.
    pub class: MouthClass,
    /// File name.
    pub file_name: String,
    /// Crop width.
    pub width: u32,
    /// Crop height.
    pub height: u32,
    /// True if the crop was single-channel.
    pub grayscale: bool,
}

/// Crop sink capturing saved crops in memory.
#[derive(Clone, Default)]
pub struct MockCropSink {
    saved: Arc<Mutex<Vec<SavedCrop>>>,
    fail: bool,
}

impl MockCropSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose writes always fail.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// All captured crops.
    #[must_use]
    pub fn saved(&self) -> Vec<SavedCrop> {
        locked(&self.saved)
    }

    /// Captured crops of one class.
    #[must_use]
    pub fn saved_in(&self, class: MouthClass) -> Vec<SavedCrop> {
        self.saved().into_iter().filter(|c| c.class == class).collect()
    }
}

impl CropSink for MockCropSink {
    fn save(&self, class: MouthClass, file_name: &str, image: &DynamicImage) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("disk full");
        }
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SavedCrop {
                class,
                file_name: file_name.to_string(),
                width: image.width(),
                height: image.height(),
                grayscale: image.color().channel_count() == 1,
            });
        Ok(())
    }
}

/// Stats output capturing rows in memory.
#[derive(Clone, Default)]
pub struct MockStatsOutput {
    rows: Arc<Mutex<Vec<VideoStats>>>,
}

impl MockStatsOutput {
    /// Creates an empty output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded rows.
    #[must_use]
    pub fn rows(&self) -> Vec<VideoStats> {
        locked(&self.rows)
    }
}

impl StatsOutput for MockStatsOutput {
    fn record(&self, row: &VideoStats) -> anyhow::Result<()> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(row.clone());
        Ok(())
    }
}

/// Mock implementation of `ProgressSink` for testing.
///
/// Captures events for later assertions.
#[derive(Clone, Default)]
pub struct MockProgressSink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl MockProgressSink {
    /// Creates a new mock progress sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all captured events.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        locked(&self.events)
    }

    /// Returns the number of `VideoFailed` events.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::VideoFailed { .. }))
            .count()
    }

    /// Returns the final counts from the `Finished` event, if any.
    #[must_use]
    pub fn finished_counts(&self) -> Option<(usize, usize)> {
        self.events().iter().find_map(|e| match e {
            ProgressEvent::Finished { processed, failed } => Some((*processed, *failed)),
            _ => None,
        })
    }
}

impl ProgressSink for MockProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::builders::SyntheticFrameBuilder;
    use yawn_dataset_core::domain::{mouth_aspect_ratio, LIP_POINTS, MOUTH_POINTS};

    #[test]
    fn test_opener_replays_frames_then_ends() {
        let opener = MockVideoOpener::new().with_video(
            "a-Yawning.avi",
            vec![FrameRead::Degenerate, FrameRead::Degenerate],
        );
        let mut source = opener.open(Path::new("/videos/a-Yawning.avi")).unwrap();

        assert!(matches!(source.read().unwrap(), FrameRead::Degenerate));
        assert!(matches!(source.read().unwrap(), FrameRead::Degenerate));
        assert!(matches!(source.read().unwrap(), FrameRead::EndOfStream));
        source.release().unwrap();
        assert_eq!(opener.released(), 1);
        assert_eq!(opener.opened().len(), 1);
    }

    #[test]
    fn test_opener_unknown_video_fails() {
        let opener = MockVideoOpener::new();
        assert!(opener.open(Path::new("missing-Normal.avi")).is_err());
    }

    #[test]
    fn test_decode_error_after() {
        let opener = MockVideoOpener::new()
            .with_video("b-Talking.avi", vec![FrameRead::Degenerate; 3])
            .with_decode_error_after("b-Talking.avi", 1);
        let mut source = opener.open(Path::new("b-Talking.avi")).unwrap();

        assert!(source.read().is_ok());
        assert!(source.read().is_err());
    }

    #[test]
    fn test_bright_detector_finds_face_box() {
        let region = FaceRegion::new(20, 30, 100, 120);
        let frame = SyntheticFrameBuilder::with_face(320, 240, region);
        let mut detector = MockFaceDetector::bright_regions(DetectorKind::Primary);

        assert_eq!(detector.detect(&frame).unwrap(), vec![region]);
        let blank = SyntheticFrameBuilder::blank(320, 240);
        assert!(detector.detect(&blank).unwrap().is_empty());
        assert_eq!(detector.calls(), 2);
    }

    #[test]
    fn test_predictor_ratio_round_trips() {
        let region = FaceRegion::new(0, 0, 100, 100);
        let predictor = MockLandmarkPredictor::with_ratio(0.8);
        let frame = SyntheticFrameBuilder::blank(100, 100);
        let points = predictor.landmarks(&frame, region).unwrap();

        let primary = mouth_aspect_ratio(&points[MOUTH_POINTS]).unwrap();
        let secondary = mouth_aspect_ratio(&points[LIP_POINTS]).unwrap();
        assert!((primary - 0.8).abs() < 1e-4);
        assert!((secondary - 0.8).abs() < 1e-4);
        assert_eq!(predictor.regions(), vec![region]);
    }

    #[test]
    fn test_predictor_fails_on_width() {
        let region = FaceRegion::new(0, 0, 50, 50);
        let predictor = MockLandmarkPredictor::with_ratio(0.8).failing_on_width(400);

        assert!(predictor
            .landmarks(&SyntheticFrameBuilder::blank(400, 300), region)
            .is_err());
        assert!(predictor
            .landmarks(&SyntheticFrameBuilder::blank(320, 240), region)
            .is_ok());
    }

    #[test]
    fn test_crop_sink_captures() {
        let sink = MockCropSink::new();
        let handle = sink.clone();
        sink.save(MouthClass::Opened, "1.jpg", &DynamicImage::new_luma8(10, 10))
            .unwrap();

        assert_eq!(handle.saved_in(MouthClass::Opened).len(), 1);
        assert!(handle.saved()[0].grayscale);
        assert!(MockCropSink::failing()
            .save(MouthClass::Closed, "2.jpg", &DynamicImage::new_luma8(1, 1))
            .is_err());
    }

    #[test]
    fn test_mock_progress_sink() {
        let sink = MockProgressSink::new();

        sink.on_event(ProgressEvent::VideoFailed {
            path: "x.avi".into(),
            reason: "boom".into(),
        });
        sink.on_event(ProgressEvent::Finished {
            processed: 1,
            failed: 1,
        });

        assert_eq!(sink.failed_count(), 1);
        assert_eq!(sink.finished_counts(), Some((1, 1)));
    }
}
