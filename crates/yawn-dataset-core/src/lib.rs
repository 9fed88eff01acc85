//! Yawn Dataset Core - Domain logic and the extraction pipeline
//!
//! This crate contains the domain types, the ports the pipeline talks to, the
//! video-to-dataset pipeline itself (face cascade, mouth arbiter, frame
//! classifier and video walker) and the ML inference adapters behind the
//! detector and landmark ports.

pub mod domain;
pub mod inference;
pub mod pipeline;
pub mod ports;

pub use domain::{
    DetectorKind, FaceRegion, ImageResult, LandmarkMethod, MouthClass, MouthState, Point, Video,
    VideoCategory, VideoResult,
};
pub use pipeline::{
    ArbiterConfig, ClassifierConfig, FaceCascade, FrameClassifier, MouthArbiter, RunSummary,
    SamplerState, SamplingPolicy, VideoWalker,
};
pub use ports::{
    CropSink, FaceDetector, FrameRead, FrameSource, LandmarkPredictor, ProgressEvent,
    ProgressSink, StatsOutput, VideoOpener, VideoStats,
};
