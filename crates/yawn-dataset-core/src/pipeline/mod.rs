//! The frame-by-frame extraction pipeline.
//!
//! A [`VideoWalker`] pulls frames from a video, locates faces with a
//! [`FaceCascade`], and hands them to a [`FrameClassifier`], which judges the
//! mouth state with a [`MouthArbiter`] and persists throttled crops.

mod arbiter;
mod cascade;
mod classifier;
mod sampler;
mod walker;

pub use arbiter::{reconcile, ArbiterConfig, MethodVerdict, MouthArbiter};
pub use cascade::FaceCascade;
pub use classifier::{ClassifierConfig, FrameClassifier, FrameContext};
pub use sampler::{SamplerState, SamplingPolicy};
pub use walker::{DetectorRotation, RunSummary, VideoWalker};
