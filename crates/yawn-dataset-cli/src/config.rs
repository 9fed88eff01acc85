//! Configuration file support for yawn-dataset.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/yawn-dataset/config.toml` (lowest priority)
//! - Project-local: `.yawn-dataset.toml` (searched up directory tree)
//! - CLI flags (highest priority, applied separately)

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General options.
    pub general: GeneralConfig,
    /// Crop output settings.
    pub output: OutputConfig,
    /// Per-class sub-sampling.
    pub sampling: SamplingConfig,
    /// Mouth-open thresholds.
    pub mouth: MouthConfig,
    /// Face detection settings.
    pub faces: FacesConfig,
    /// Optional DNN detectors.
    pub detectors: DetectorsConfig,
    /// Model settings.
    pub models: ModelsConfig,
}

/// General configuration options.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Dataset root holding the videos.
    pub dataset_dir: Option<PathBuf>,
    /// Recurse into subdirectories.
    pub recursive: Option<bool>,
}

/// Crop output configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output root holding `opened/` and `closed/`.
    pub dir: Option<PathBuf>,
    /// Keep crops in color.
    pub color: Option<bool>,
    /// Crop width in pixels.
    pub width: Option<u32>,
    /// Crop height in pixels.
    pub height: Option<u32>,
    /// Stats CSV path, relative to the output root unless absolute.
    pub stats_file: Option<PathBuf>,
    /// Show progress bar.
    pub progress: Option<bool>,
}

/// Sub-sampling configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Keep every Nth open-mouth frame.
    pub open_step: Option<u64>,
    /// Keep every Mth closed-mouth frame.
    pub closed_step: Option<u64>,
}

/// Mouth threshold configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct MouthConfig {
    /// Open threshold for the 68-point landmarks.
    pub primary_threshold: Option<f32>,
    /// Open threshold for the 3D landmarks.
    pub secondary_threshold: Option<f32>,
}

/// Face detection configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct FacesConfig {
    /// Minimum crop side in pixels.
    pub min_face_size: Option<u32>,
    /// SSD score threshold (0.0-1.0).
    pub ssd_score_threshold: Option<f32>,
    /// `BlazeFace` score threshold (0.0-1.0).
    pub blazeface_score_threshold: Option<f32>,
    /// Smallest face the frontal detector searches for.
    pub frontal_min_face_size: Option<u32>,
}

/// DNN detector toggles.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorsConfig {
    /// Enable the SSD detector.
    pub ssd: Option<bool>,
    /// Enable the `BlazeFace` detector.
    pub blazeface: Option<bool>,
}

/// Model configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Custom models directory path.
    pub dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files.
    ///
    /// Priority (lowest to highest):
    /// 1. XDG config: `~/.config/yawn-dataset/config.toml`
    /// 2. Project-local: `.yawn-dataset.toml` (searched up from cwd)
    ///
    /// Missing files are silently ignored. Invalid values are logged as warnings.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(xdg_path) = xdg_config_path() {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(&xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        if let Some(project_path) = find_project_config() {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(&project_path) {
                config.merge(project_config);
            }
        }

        if let Err(e) = config.validate() {
            eprintln!("warning: {e}");
        }

        config
    }

    /// Validate configuration values are within acceptable ranges.
    fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("mouth.primary_threshold", self.mouth.primary_threshold),
            ("mouth.secondary_threshold", self.mouth.secondary_threshold),
        ] {
            if let Some(t) = value {
                if !t.is_finite() || t <= 0.0 {
                    return Err(format!("{name} must be a positive number, got {t}"));
                }
            }
        }

        for (name, value) in [
            ("faces.ssd_score_threshold", self.faces.ssd_score_threshold),
            (
                "faces.blazeface_score_threshold",
                self.faces.blazeface_score_threshold,
            ),
        ] {
            if let Some(t) = value {
                if !(0.0..=1.0).contains(&t) {
                    return Err(format!("{name} must be 0.0-1.0, got {t}"));
                }
            }
        }

        for (name, value) in [
            ("sampling.open_step", self.sampling.open_step),
            ("sampling.closed_step", self.sampling.closed_step),
        ] {
            if value == Some(0) {
                return Err(format!("{name} must be at least 1"));
            }
        }

        for (name, value) in [
            ("output.width", self.output.width),
            ("output.height", self.output.height),
        ] {
            if value == Some(0) {
                return Err(format!("{name} must be at least 1"));
            }
        }

        Ok(())
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    fn merge(&mut self, other: Self) {
        // General
        self.general.dataset_dir = other
            .general
            .dataset_dir
            .or_else(|| self.general.dataset_dir.take());
        self.general.recursive = other.general.recursive.or(self.general.recursive);

        // Output
        self.output.dir = other.output.dir.or_else(|| self.output.dir.take());
        self.output.color = other.output.color.or(self.output.color);
        self.output.width = other.output.width.or(self.output.width);
        self.output.height = other.output.height.or(self.output.height);
        self.output.stats_file = other
            .output
            .stats_file
            .or_else(|| self.output.stats_file.take());
        self.output.progress = other.output.progress.or(self.output.progress);

        // Sampling
        self.sampling.open_step = other.sampling.open_step.or(self.sampling.open_step);
        self.sampling.closed_step = other.sampling.closed_step.or(self.sampling.closed_step);

        // Mouth
        self.mouth.primary_threshold = other
            .mouth
            .primary_threshold
            .or(self.mouth.primary_threshold);
        self.mouth.secondary_threshold = other
            .mouth
            .secondary_threshold
            .or(self.mouth.secondary_threshold);

        // Faces
        self.faces.min_face_size = other.faces.min_face_size.or(self.faces.min_face_size);
        self.faces.ssd_score_threshold = other
            .faces
            .ssd_score_threshold
            .or(self.faces.ssd_score_threshold);
        self.faces.blazeface_score_threshold = other
            .faces
            .blazeface_score_threshold
            .or(self.faces.blazeface_score_threshold);
        self.faces.frontal_min_face_size = other
            .faces
            .frontal_min_face_size
            .or(self.faces.frontal_min_face_size);

        // Detectors
        self.detectors.ssd = other.detectors.ssd.or(self.detectors.ssd);
        self.detectors.blazeface = other.detectors.blazeface.or(self.detectors.blazeface);

        // Models
        self.models.dir = other.models.dir.or_else(|| self.models.dir.take());
    }
}

/// Get the XDG config file path.
fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("yawn-dataset").join("config.toml"))
}

/// Find project-local config by searching up from current directory.
fn find_project_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_parents(&cwd)
}

/// Search for `.yawn-dataset.toml` in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);

    while let Some(dir) = current {
        let config_path = dir.join(".yawn-dataset.toml");
        if config_path.exists() {
            return Some(config_path);
        }
        current = dir.parent();
    }

    None
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config: AppConfig = toml::from_str("").expect("parse empty config");
        assert!(config.output.dir.is_none());
        assert!(config.sampling.open_step.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r"
[general]
dataset_dir = '/data/YawDD'
recursive = true

[output]
dir = 'out'
color = true
width = 64
height = 48
stats_file = 'stats.csv'
progress = false

[sampling]
open_step = 2
closed_step = 8

[mouth]
primary_threshold = 0.55
secondary_threshold = 0.8

[faces]
min_face_size = 40
ssd_score_threshold = 0.6
blazeface_score_threshold = 0.7
frontal_min_face_size = 30

[detectors]
ssd = false
blazeface = true

[models]
dir = '/opt/models'
";
        let config: AppConfig = toml::from_str(toml).expect("parse full config");

        assert_eq!(
            config.general.dataset_dir,
            Some(PathBuf::from("/data/YawDD"))
        );
        assert_eq!(config.output.color, Some(true));
        assert_eq!(config.output.width, Some(64));
        assert_eq!(config.sampling.closed_step, Some(8));
        assert_eq!(config.mouth.primary_threshold, Some(0.55));
        assert_eq!(config.faces.frontal_min_face_size, Some(30));
        assert_eq!(config.detectors.ssd, Some(false));
        assert_eq!(config.models.dir, Some(PathBuf::from("/opt/models")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_configs() {
        let mut base: AppConfig = toml::from_str(
            r"
[sampling]
open_step = 1
closed_step = 4

[mouth]
primary_threshold = 0.6
",
        )
        .expect("parse base");

        let override_config: AppConfig = toml::from_str(
            r"
[sampling]
closed_step = 10

[detectors]
blazeface = false
",
        )
        .expect("parse override");

        base.merge(override_config);

        assert_eq!(base.sampling.closed_step, Some(10));
        assert_eq!(base.sampling.open_step, Some(1));
        assert_eq!(base.mouth.primary_threshold, Some(0.6));
        assert_eq!(base.detectors.blazeface, Some(false));
    }

    #[test]
    fn test_merge_empty_override_preserves_base() {
        let mut base: AppConfig = toml::from_str(
            r"
[output]
dir = 'keep'
",
        )
        .expect("parse base");

        base.merge(AppConfig::default());

        assert_eq!(base.output.dir, Some(PathBuf::from("keep")));
    }

    #[test]
    fn test_invalid_field_type_handled() {
        let toml = r#"
[sampling]
open_step = "every"
"#;
        let result: Result<AppConfig, _> = toml::from_str(toml);
        assert!(result.is_err(), "type mismatch should return error");
    }

    #[test]
    fn test_validate_zero_step() {
        let mut config = AppConfig::default();
        config.sampling.closed_step = Some(0);

        let result = config.validate();
        assert!(result.unwrap_err().contains("sampling.closed_step"));
    }

    #[test]
    fn test_validate_thresholds() {
        let mut config = AppConfig::default();
        config.mouth.secondary_threshold = Some(-0.1);
        assert!(config
            .validate()
            .unwrap_err()
            .contains("mouth.secondary_threshold"));

        let mut config = AppConfig::default();
        config.faces.ssd_score_threshold = Some(1.5);
        assert!(config
            .validate()
            .unwrap_err()
            .contains("faces.ssd_score_threshold"));
    }

    #[test]
    fn test_validate_zero_crop_size() {
        let mut config = AppConfig::default();
        config.output.height = Some(0);
        assert!(config.validate().unwrap_err().contains("output.height"));
    }

    #[test]
    fn test_find_config_in_parents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(".yawn-dataset.toml"), "").unwrap();

        let found = find_config_in_parents(&nested).unwrap();
        assert_eq!(found, dir.path().join(".yawn-dataset.toml"));
    }
}
