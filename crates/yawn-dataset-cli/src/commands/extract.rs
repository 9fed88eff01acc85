//! Extract command - turn yawning videos into a labeled mouth dataset.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, info, warn};
use yawn_dataset_adapters::models::names;
use yawn_dataset_adapters::{require_model, set_models_dir, CsvStatsOutput, FsCropSink, FsVideoSource};
use yawn_dataset_core::inference::{
    defaults as model_defaults, BlazeFaceDetector, FaceAlign3d, FrontalFaceDetector,
    Landmarks68, SsdFaceDetector,
};
use yawn_dataset_core::{
    ArbiterConfig, ClassifierConfig, FaceCascade, FaceDetector, FrameClassifier, MouthArbiter,
    RunSummary, SamplingPolicy, VideoOpener, VideoWalker,
};

use super::ExitCode;
use crate::config::AppConfig;
use crate::output::ProgressBar;

/// Hardcoded default values.
mod defaults {
    pub const OUTPUT_DIR: &str = "mouth_state";
    pub const COLOR_SUFFIX: &str = "_color";
    pub const STATS_FILE: &str = "video_stat.csv";
    pub const CROP_SIZE: u32 = 100;
    pub const OPEN_STEP: u64 = 1;
    pub const CLOSED_STEP: u64 = 4;
    pub const PRIMARY_THRESHOLD: f32 = 0.6;
    pub const SECONDARY_THRESHOLD: f32 = 0.75;
    pub const MIN_FACE_SIZE: u32 = 50;
}

/// Parse a mouth-open threshold (a positive aspect ratio).
fn parse_ratio(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("{value} is not a positive ratio"))
    }
}

/// Parse a sampling step (at least 1).
fn parse_step(s: &str) -> Result<u64, String> {
    let value: u64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid count"))?;
    if value == 0 {
        Err("step must be at least 1".to_string())
    } else {
        Ok(value)
    }
}

/// Arguments for dataset extraction.
#[derive(Args, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ExtractArgs {
    /// Dataset directory containing .avi videos
    pub dataset_dir: Option<PathBuf>,

    /// Output directory for the opened/ and closed/ crops
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Keep crops in color instead of grayscale
    #[arg(long)]
    pub color: bool,

    /// Keep every Nth open-mouth frame
    #[arg(long, value_name = "N", value_parser = parse_step)]
    pub open_step: Option<u64>,

    /// Keep every Nth closed-mouth frame
    #[arg(long, value_name = "N", value_parser = parse_step)]
    pub closed_step: Option<u64>,

    /// Mouth aspect ratio at which the 68-point landmarks call a mouth open
    #[arg(long, value_parser = parse_ratio, allow_negative_numbers = true)]
    pub primary_threshold: Option<f32>,

    /// Mouth aspect ratio at which the 3D landmarks call a mouth open
    #[arg(long, value_parser = parse_ratio, allow_negative_numbers = true)]
    pub secondary_threshold: Option<f32>,

    /// Disable the SSD face detector
    #[arg(long)]
    pub no_ssd: bool,

    /// Disable the `BlazeFace` detector
    #[arg(long)]
    pub no_blazeface: bool,

    /// Custom models directory (overrides default and config)
    #[arg(long, value_name = "DIR")]
    pub models_dir: Option<PathBuf>,

    /// Show progress bar
    #[arg(long)]
    pub progress: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Merged config (populated by `with_config`, not from CLI).
    #[arg(skip)]
    config: AppConfig,
}

impl ExtractArgs {
    /// Apply configuration file values, respecting CLI precedence.
    ///
    /// Layering priority (lowest to highest):
    /// 1. Hardcoded defaults (in accessor methods)
    /// 2. Config file values (XDG, then project-local)
    /// 3. CLI arguments (already set on self)
    #[must_use]
    pub fn with_config(mut args: Self, config: &AppConfig) -> Self {
        if args.dataset_dir.is_none() {
            args.dataset_dir.clone_from(&config.general.dataset_dir);
        }
        if args.output.is_none() {
            args.output.clone_from(&config.output.dir);
        }
        if !args.color {
            args.color = config.output.color.unwrap_or(false);
        }

        args.open_step = args.open_step.or(config.sampling.open_step);
        args.closed_step = args.closed_step.or(config.sampling.closed_step);
        args.primary_threshold = args.primary_threshold.or(config.mouth.primary_threshold);
        args.secondary_threshold = args
            .secondary_threshold
            .or(config.mouth.secondary_threshold);

        // CLI --no-* always wins
        if !args.no_ssd {
            args.no_ssd = config.detectors.ssd == Some(false);
        }
        if !args.no_blazeface {
            args.no_blazeface = config.detectors.blazeface == Some(false);
        }

        if !args.progress {
            args.progress = config.output.progress.unwrap_or(false);
        }
        if args.models_dir.is_none() {
            args.models_dir.clone_from(&config.models.dir);
        }

        args.config = config.clone();
        args
    }

    /// Output root, suffixed in color mode unless set explicitly.
    fn output_dir(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            if self.color {
                PathBuf::from(format!("{}{}", defaults::OUTPUT_DIR, defaults::COLOR_SUFFIX))
            } else {
                PathBuf::from(defaults::OUTPUT_DIR)
            }
        })
    }

    fn stats_file(&self, output_dir: &Path) -> PathBuf {
        let file = self
            .config
            .output
            .stats_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(defaults::STATS_FILE));
        output_dir.join(file)
    }

    fn sampling(&self) -> SamplingPolicy {
        SamplingPolicy::new(
            self.open_step.unwrap_or(defaults::OPEN_STEP),
            self.closed_step.unwrap_or(defaults::CLOSED_STEP),
        )
    }

    fn arbiter_config(&self) -> ArbiterConfig {
        ArbiterConfig {
            primary_threshold: self
                .primary_threshold
                .unwrap_or(defaults::PRIMARY_THRESHOLD),
            secondary_threshold: self
                .secondary_threshold
                .unwrap_or(defaults::SECONDARY_THRESHOLD),
        }
    }

    fn classifier_config(&self) -> ClassifierConfig {
        let output = &self.config.output;
        ClassifierConfig {
            min_face_size: self
                .config
                .faces
                .min_face_size
                .unwrap_or(defaults::MIN_FACE_SIZE),
            output_width: output.width.unwrap_or(defaults::CROP_SIZE),
            output_height: output.height.unwrap_or(defaults::CROP_SIZE),
            color: self.color,
            sampling: self.sampling(),
        }
    }
}

/// Print the run totals.
fn print_summary(summary: &RunSummary) {
    println!("Videos processed: {}", summary.processed);
    println!("Failed videos: {}", summary.failed);
    println!("Total read images: {}", summary.total_frames);
    println!("Total saved images: {}", summary.saved());
    println!("Saved opened mouth images: {}", summary.saved_opened);
    println!("Saved closed mouth images: {}", summary.saved_closed);
}

/// Exit code for a finished run.
#[must_use]
pub const fn exit_code(summary: &RunSummary) -> ExitCode {
    if summary.failed > 0 {
        ExitCode::VideosFailed
    } else {
        ExitCode::Success
    }
}

/// Run the extract command.
///
/// Expects `args` to have been processed through `with_config()` first
/// to apply configuration file settings.
///
/// # Errors
///
/// Returns an error if no dataset directory is given, the output cannot be
/// created, or a model fails to load.
pub fn run(args: &ExtractArgs) -> Result<RunSummary> {
    let Some(dataset_dir) = args.dataset_dir.as_deref() else {
        anyhow::bail!("No dataset directory specified");
    };
    info!("Running extract command on {}", dataset_dir.display());

    if let Some(ref models_dir) = args.models_dir {
        debug!("Using custom models directory: {}", models_dir.display());
        set_models_dir(models_dir.clone());
    }

    let recursive = args.config.general.recursive.unwrap_or(true);
    let videos = FsVideoSource::new(dataset_dir, recursive).videos();

    if videos.is_empty() {
        warn!("No videos found in {}", dataset_dir.display());
        let summary = RunSummary::default();
        print_summary(&summary);
        return Ok(summary);
    }

    let output_dir = args.output_dir();
    let mut walker = build_walker(args, &output_dir)?;
    let stats = CsvStatsOutput::new(args.stats_file(&output_dir));

    let show_progress = !args.quiet && (args.progress || std::io::stderr().is_terminal());
    let progress = ProgressBar::new(Some(videos.len() as u64), args.quiet, show_progress);

    let summary = walker.process_all(&videos, &stats, &progress);
    print_summary(&summary);
    Ok(summary)
}

/// Loads every model and wires the pipeline for one run.
fn build_walker(args: &ExtractArgs, output_dir: &Path) -> Result<VideoWalker> {
    let opener = video_opener()?;
    let faces = &args.config.faces;

    let mut detectors: Vec<Box<dyn FaceDetector>> = vec![Box::new(
        FrontalFaceDetector::load(
            require_model(names::SEETA_FRONTAL)?,
            faces
                .frontal_min_face_size
                .unwrap_or(model_defaults::FRONTAL_MIN_FACE_SIZE),
        )
        .context("Failed to load frontal face detector")?,
    )];
    if args.no_ssd {
        info!("SSD detector disabled");
    } else {
        detectors.push(Box::new(SsdFaceDetector::load(
            require_model(names::SSD_FACE)?,
            faces
                .ssd_score_threshold
                .unwrap_or(model_defaults::SSD_SCORE_THRESHOLD),
        )?));
    }
    if args.no_blazeface {
        info!("BlazeFace detector disabled");
    } else {
        detectors.push(Box::new(BlazeFaceDetector::load(
            require_model(names::BLAZEFACE)?,
            faces
                .blazeface_score_threshold
                .unwrap_or(model_defaults::BLAZEFACE_SCORE_THRESHOLD),
        )?));
    }

    let arbiter = MouthArbiter::new(
        Box::new(Landmarks68::load(require_model(names::LANDMARKS68)?)?),
        Box::new(FaceAlign3d::load(require_model(names::FACE_ALIGN3D)?)?),
        args.arbiter_config(),
    );

    let sink = FsCropSink::new(output_dir)?;
    info!("Writing crops to {}", sink.root().display());

    let classifier = FrameClassifier::new(arbiter, Box::new(sink), args.classifier_config());
    Ok(VideoWalker::new(
        opener,
        FaceCascade::new(detectors),
        classifier,
    ))
}

#[cfg(feature = "ffmpeg")]
fn video_opener() -> Result<Box<dyn VideoOpener>> {
    Ok(Box::new(yawn_dataset_adapters::FfmpegVideoOpener::new()?))
}

#[cfg(not(feature = "ffmpeg"))]
fn video_opener() -> Result<Box<dyn VideoOpener>> {
    anyhow::bail!("Video decoding support is not compiled in; rebuild with `--features ffmpeg`")
}
