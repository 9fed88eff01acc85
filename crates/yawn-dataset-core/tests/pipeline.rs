//! End-to-end tests of the video walker over mocked ports.

#![allow(clippy::unwrap_used)]

use yawn_dataset_core::domain::{DetectorKind, MouthClass, Video, VideoResult};
use yawn_dataset_core::pipeline::{
    ArbiterConfig, ClassifierConfig, FaceCascade, FrameClassifier, MouthArbiter, RunSummary,
    SamplingPolicy, VideoWalker,
};
use yawn_dataset_core::ports::{ProgressEvent, VideoStats};
use yawn_dataset_test_support::{
    MockCropSink, MockFaceDetector, MockLandmarkPredictor, MockProgressSink, MockStatsOutput,
    MockVideoOpener, SyntheticVideo,
};

struct Harness {
    walker: VideoWalker,
    opener: MockVideoOpener,
    sink: MockCropSink,
}

fn detectors(ssd: MockFaceDetector) -> Vec<MockFaceDetector> {
    vec![
        MockFaceDetector::bright_regions(DetectorKind::Primary),
        ssd,
        MockFaceDetector::bright_regions(DetectorKind::BlazeFace),
    ]
}

fn harness(
    opener: MockVideoOpener,
    detectors: &[MockFaceDetector],
    predictor: &MockLandmarkPredictor,
    sampling: SamplingPolicy,
) -> Harness {
    let sink = MockCropSink::new();
    let cascade = FaceCascade::new(detectors.iter().map(MockFaceDetector::boxed).collect());
    let arbiter = MouthArbiter::new(predictor.boxed(), predictor.boxed(), ArbiterConfig::default());
    let classifier = FrameClassifier::new(
        arbiter,
        Box::new(sink.clone()),
        ClassifierConfig {
            sampling,
            ..ClassifierConfig::default()
        },
    );
    Harness {
        walker: VideoWalker::new(Box::new(opener.clone()), cascade, classifier),
        opener,
        sink,
    }
}

fn names(sink: &MockCropSink) -> Vec<String> {
    sink.saved().into_iter().map(|c| c.file_name).collect()
}

#[test]
fn test_yawning_video_saves_open_crops_across_rotation() {
    let frames = SyntheticVideo::new(10).faces_at(&[3, 7]).build();
    let opener = MockVideoOpener::new().with_video("1-Female-Yawning.avi", frames);
    let mut h = harness(
        opener,
        &detectors(MockFaceDetector::bright_regions(DetectorKind::Ssd)),
        &MockLandmarkPredictor::with_ratio(0.9),
        SamplingPolicy::default(),
    );

    let result = h
        .walker
        .process_video(&Video::new(1, "/videos/1-Female-Yawning.avi"))
        .unwrap();

    assert_eq!(result.total_frames, 10);
    assert_eq!(result.opened_counter, 2);
    assert_eq!(result.closed_counter, 0);
    assert_eq!(result.primary_counter, 1);
    assert_eq!(result.ssd_counter, 1);
    assert_eq!(
        names(&h.sink),
        [
            "1_0.90_1_3_primary_primary.jpg",
            "2_0.90_1_7_ssd_primary.jpg"
        ]
    );
    let saved = h.sink.saved_in(MouthClass::Opened);
    assert!(saved
        .iter()
        .all(|c| c.width == 100 && c.height == 100 && c.grayscale));
    assert_eq!(h.opener.released(), 1);
}

#[test]
fn test_open_mouth_in_normal_video_is_dropped() {
    let frames = SyntheticVideo::new(10).faces_at(&[3, 7]).build();
    let opener = MockVideoOpener::new().with_video("1-Female-Normal.avi", frames);
    let mut h = harness(
        opener,
        &detectors(MockFaceDetector::bright_regions(DetectorKind::Ssd)),
        &MockLandmarkPredictor::with_ratio(0.9),
        SamplingPolicy::default(),
    );

    let result = h
        .walker
        .process_video(&Video::new(2, "1-Female-Normal.avi"))
        .unwrap();

    assert_eq!(result.total_frames, 10);
    assert_eq!(result.images_saved(), 0);
    assert!(h.sink.saved().is_empty());
}

#[test]
fn test_closed_mouths_are_sub_sampled() {
    let frames = SyntheticVideo::new(8).faces_at(&[1, 2, 3, 4, 5, 6, 7, 8]).build();
    let opener = MockVideoOpener::new().with_video("3-Male-Talking.avi", frames);
    let mut h = harness(
        opener,
        &detectors(MockFaceDetector::bright_regions(DetectorKind::Ssd)),
        &MockLandmarkPredictor::with_ratio(0.2),
        SamplingPolicy::new(1, 4),
    );

    let result = h
        .walker
        .process_video(&Video::new(3, "3-Male-Talking.avi"))
        .unwrap();

    assert_eq!(result.closed_counter, 2);
    assert_eq!(h.walker.sampler().closed_read, 8);
    assert_eq!(h.walker.sampler().closed_saved, 2);
    let saved = names(&h.sink);
    assert!(saved[0].starts_with("4_0.20_3_4_"));
    assert!(saved[1].starts_with("8_0.20_3_8_"));
}

#[test]
fn test_dnn_miss_advances_rotation_and_skips_frame() {
    let frames = SyntheticVideo::new(9).faces_at(&[3, 7, 9]).build();
    let opener = MockVideoOpener::new().with_video("4-Female-Yawning.avi", frames);
    let mut h = harness(
        opener,
        &detectors(MockFaceDetector::blind(DetectorKind::Ssd)),
        &MockLandmarkPredictor::with_ratio(0.9),
        SamplingPolicy::default(),
    );

    let result = h
        .walker
        .process_video(&Video::new(4, "4-Female-Yawning.avi"))
        .unwrap();

    assert_eq!(result.primary_counter, 1);
    assert_eq!(result.ssd_counter, 0);
    assert_eq!(result.blazeface_counter, 1);
    assert_eq!(
        names(&h.sink),
        [
            "1_0.90_4_3_primary_primary.jpg",
            "2_0.90_4_9_blazeface_primary.jpg"
        ]
    );
}

#[test]
fn test_sunglasses_video_is_never_opened() {
    let opener = MockVideoOpener::new()
        .with_video("5-Male-SunGlasses-Yawning.avi", SyntheticVideo::new(3).build());
    let mut h = harness(
        opener,
        &detectors(MockFaceDetector::bright_regions(DetectorKind::Ssd)),
        &MockLandmarkPredictor::with_ratio(0.9),
        SamplingPolicy::default(),
    );

    let result = h
        .walker
        .process_video(&Video::new(5, "5-Male-SunGlasses-Yawning.avi"))
        .unwrap();

    assert_eq!(result, VideoResult::empty());
    assert!(h.opener.opened().is_empty());
}

#[test]
fn test_unopenable_video_yields_empty_result() {
    let mut h = harness(
        MockVideoOpener::new(),
        &detectors(MockFaceDetector::bright_regions(DetectorKind::Ssd)),
        &MockLandmarkPredictor::with_ratio(0.9),
        SamplingPolicy::default(),
    );

    let result = h
        .walker
        .process_video(&Video::new(6, "6-Female-Yawning.avi"))
        .unwrap();

    assert_eq!(result, VideoResult::empty());
    assert_eq!(h.opener.opened().len(), 1);
    assert_eq!(h.opener.released(), 0);
}

#[test]
fn test_decode_error_ends_video_early() {
    let opener = MockVideoOpener::new()
        .with_video("7-Male-Yawning.avi", SyntheticVideo::new(10).build())
        .with_decode_error_after("7-Male-Yawning.avi", 5);
    let mut h = harness(
        opener,
        &detectors(MockFaceDetector::bright_regions(DetectorKind::Ssd)),
        &MockLandmarkPredictor::with_ratio(0.9),
        SamplingPolicy::default(),
    );

    let result = h
        .walker
        .process_video(&Video::new(7, "7-Male-Yawning.avi"))
        .unwrap();

    assert_eq!(result.total_frames, 5);
    assert_eq!(h.opener.released(), 1);
}

#[test]
fn test_degenerate_frames_are_not_counted() {
    let frames = SyntheticVideo::new(4).degenerate_before(&[2, 4]).build();
    let opener = MockVideoOpener::new().with_video("8-Female-Yawning.avi", frames);
    let mut h = harness(
        opener,
        &detectors(MockFaceDetector::bright_regions(DetectorKind::Ssd)),
        &MockLandmarkPredictor::with_ratio(0.9),
        SamplingPolicy::default(),
    );

    let result = h
        .walker
        .process_video(&Video::new(8, "8-Female-Yawning.avi"))
        .unwrap();

    assert_eq!(result.total_frames, 4);
}

#[test]
fn test_arbiter_failure_aborts_video_after_release() {
    let frames = SyntheticVideo::new(5).faces_at(&[2]).build();
    let opener = MockVideoOpener::new()
        .with_video("9-Male-Yawning.avi", frames)
        .with_failing_release();
    let mut h = harness(
        opener,
        &detectors(MockFaceDetector::bright_regions(DetectorKind::Ssd)),
        &MockLandmarkPredictor::failing(),
        SamplingPolicy::default(),
    );

    let err = h
        .walker
        .process_video(&Video::new(9, "9-Male-Yawning.avi"))
        .unwrap_err();

    assert!(format!("{err:#}").contains("9-Male-Yawning.avi"));
    assert_eq!(h.opener.released(), 1);
    assert!(h.sink.saved().is_empty());
}

#[test]
fn test_failing_detector_falls_through_cascade() {
    let primary = MockFaceDetector::failing(DetectorKind::Primary);
    let ssd = MockFaceDetector::bright_regions(DetectorKind::Ssd);
    let blaze = MockFaceDetector::bright_regions(DetectorKind::BlazeFace);
    let frames = SyntheticVideo::new(3).faces_at(&[2]).build();
    let opener = MockVideoOpener::new().with_video("10-Female-Yawning.avi", frames);
    let mut h = harness(
        opener,
        &[primary.clone(), ssd.clone(), blaze],
        &MockLandmarkPredictor::with_ratio(0.9),
        SamplingPolicy::default(),
    );

    let result = h
        .walker
        .process_video(&Video::new(10, "10-Female-Yawning.avi"))
        .unwrap();

    assert_eq!(primary.calls(), 3);
    assert_eq!(ssd.calls(), 3);
    assert_eq!(result.primary_counter, 1);
}

#[test]
fn test_dnn_classification_saves_one_crop_per_frame() {
    let primary = MockFaceDetector::bright_regions(DetectorKind::Primary);
    let ssd = MockFaceDetector::bright_regions(DetectorKind::Ssd);
    let blaze = MockFaceDetector::bright_regions(DetectorKind::BlazeFace);
    let frames = SyntheticVideo::new(3).faces_at(&[1, 2, 3]).build();
    let opener = MockVideoOpener::new().with_video("11-Male-Yawning.avi", frames);
    let mut h = harness(
        opener,
        &[primary, ssd.clone(), blaze.clone()],
        &MockLandmarkPredictor::with_ratio(0.9),
        SamplingPolicy::default(),
    );

    let result = h
        .walker
        .process_video(&Video::new(11, "11-Male-Yawning.avi"))
        .unwrap();

    assert_eq!(result.images_saved(), 3);
    assert_eq!(ssd.calls(), 1);
    assert_eq!(blaze.calls(), 1);
    assert_eq!(
        names(&h.sink),
        [
            "1_0.90_11_1_primary_primary.jpg",
            "2_0.90_11_2_ssd_primary.jpg",
            "3_0.90_11_3_blazeface_primary.jpg"
        ]
    );
}

#[test]
fn test_run_continues_past_failed_video_and_records_finished_ones() {
    let failing = SyntheticVideo::new(5).size(400, 300).faces_at(&[2]).build();
    let good = SyntheticVideo::new(10).faces_at(&[3, 7]).build();
    let opener = MockVideoOpener::new()
        .with_video("1-Female-Yawning.avi", failing)
        .with_video("2-Male-SunGlasses-Yawning.avi", SyntheticVideo::new(3).build())
        .with_video("3-Female-Yawning.avi", good);
    let mut h = harness(
        opener,
        &detectors(MockFaceDetector::bright_regions(DetectorKind::Ssd)),
        &MockLandmarkPredictor::with_ratio(0.9).failing_on_width(400),
        SamplingPolicy::default(),
    );
    let videos = [
        Video::new(1, "/videos/1-Female-Yawning.avi"),
        Video::new(2, "/videos/2-Male-SunGlasses-Yawning.avi"),
        Video::new(3, "/videos/3-Female-Yawning.avi"),
        Video::new(4, "/videos/4-Male-Yawning.avi"),
    ];
    let stats = MockStatsOutput::new();
    let progress = MockProgressSink::new();

    let summary = h.walker.process_all(&videos, &stats, &progress);

    assert_eq!(
        summary,
        RunSummary {
            processed: 3,
            failed: 1,
            total_frames: 10,
            saved_opened: 2,
            saved_closed: 0,
        }
    );
    let row = |video_id: u32, file_name: &str, total_frames: u64, opened: u64| VideoStats {
        video_id,
        file_name: file_name.to_string(),
        total_frames,
        images_saved: opened,
        opened,
        closed: 0,
    };
    assert_eq!(
        stats.rows(),
        [
            row(2, "2-Male-SunGlasses-Yawning.avi", 0, 0),
            row(3, "3-Female-Yawning.avi", 10, 2),
            row(4, "4-Male-Yawning.avi", 0, 0),
        ]
    );
    assert_eq!(progress.failed_count(), 1);
    assert_eq!(progress.finished_counts(), Some((3, 1)));
    assert!(matches!(
        progress.events().first(),
        Some(ProgressEvent::VideoStarted { index: 0, total: Some(4), .. })
    ));
    assert_eq!(
        names(&h.sink),
        [
            "1_0.90_3_3_primary_primary.jpg",
            "2_0.90_3_7_ssd_primary.jpg"
        ]
    );
    assert_eq!(h.opener.released(), 2);
}
