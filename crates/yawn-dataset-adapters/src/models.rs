//! Model registry, downloading and caching adapter.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Download progress callback: model name, bytes so far, total bytes if known.
pub type ProgressCallback = Box<dyn Fn(&str, u64, Option<u64>) + Send + Sync>;

/// Model metadata.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name/identifier.
    pub name: &'static str,
    /// What the model is used for.
    pub role: &'static str,
    /// Download URL. Models without one must be placed in the models directory.
    pub url: Option<&'static str>,
    /// Expected SHA256 hash. `None` skips verification.
    pub sha256: Option<&'static str>,
    /// Filename in models directory.
    pub filename: &'static str,
}

/// Registry names.
pub mod names {
    /// SeetaFace frontal cascade for `rustface`.
    pub const SEETA_FRONTAL: &str = "seeta_frontal";
    /// ONNX single-shot face detector.
    pub const SSD_FACE: &str = "ssd_face";
    /// `BlazeFace` weights.
    pub const BLAZEFACE: &str = "blazeface";
    /// 68-point landmark regressor weights.
    pub const LANDMARKS68: &str = "landmarks68";
    /// 3D face alignment weights.
    pub const FACE_ALIGN3D: &str = "face_align3d";
}

/// Known models.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: names::SEETA_FRONTAL,
        role: "primary face detector",
        url: Some(
            "https://github.com/atomashpolskiy/rustface/raw/master/model/seeta_fd_frontal_v1.0.bin",
        ),
        sha256: None,
        filename: "seeta_fd_frontal_v1.0.bin",
    },
    ModelInfo {
        name: names::SSD_FACE,
        role: "SSD face detector",
        url: Some(
            "https://github.com/Linzaer/Ultra-Light-Fast-Generic-Face-Detector-1MB/raw/master/models/onnx/version-RFB-320.onnx",
        ),
        sha256: None,
        filename: "version-RFB-320.onnx",
    },
    ModelInfo {
        name: names::BLAZEFACE,
        role: "BlazeFace detector",
        url: None,
        sha256: None,
        filename: "blazeface.safetensors",
    },
    ModelInfo {
        name: names::LANDMARKS68,
        role: "primary landmarks",
        url: None,
        sha256: None,
        filename: "landmarks68.safetensors",
    },
    ModelInfo {
        name: names::FACE_ALIGN3D,
        role: "secondary 3D landmarks",
        url: None,
        sha256: None,
        filename: "face_align3d.safetensors",
    },
];

static MODELS_DIR_OVERRIDE: OnceCell<PathBuf> = OnceCell::new();

/// Overrides the models directory for the rest of the process.
///
/// Only the first call takes effect.
pub fn set_models_dir(dir: impl Into<PathBuf>) {
    let dir = dir.into();
    if MODELS_DIR_OVERRIDE.set(dir.clone()).is_err() {
        warn!(
            "Models directory already set, ignoring {}",
            dir.display()
        );
    }
}

/// Returns the models directory path.
///
/// Uses the override if set, else `XDG_DATA_HOME/yawn-dataset/models` or
/// `~/.local/share/yawn-dataset/models`.
#[must_use]
pub fn models_dir() -> PathBuf {
    if let Some(dir) = MODELS_DIR_OVERRIDE.get() {
        return dir.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("yawn-dataset")
        .join("models")
}

/// Looks up a registry entry.
#[must_use]
pub fn model_info(name: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|m| m.name == name)
}

/// Returns the path to a specific model file.
#[must_use]
pub fn model_path(name: &str) -> Option<PathBuf> {
    model_info(name).map(|m| models_dir().join(m.filename))
}

/// Returns the path to an installed model.
///
/// # Errors
///
/// Returns an error if the name is unknown or the file is missing.
pub fn require_model(name: &str) -> Result<PathBuf> {
    let info = model_info(name).with_context(|| format!("Unknown model: {name}"))?;
    let path = models_dir().join(info.filename);
    if !path.exists() {
        let hint = if info.url.is_some() {
            "run `yawn-dataset models fetch`"
        } else {
            "place the weights there manually"
        };
        anyhow::bail!(
            "Model {name} ({}) not found at {}; {hint}",
            info.role,
            path.display()
        );
    }
    Ok(path)
}

/// Ensures all downloadable models are present.
///
/// # Errors
///
/// Returns an error if:
/// - The models directory cannot be created
/// - A model download fails
/// - A model's checksum doesn't match
pub fn ensure_models() -> Result<()> {
    ensure_models_with_progress(None)
}

/// Like [`ensure_models`], reporting download progress.
///
/// # Errors
///
/// See [`ensure_models`].
pub fn ensure_models_with_progress(progress: Option<&ProgressCallback>) -> Result<()> {
    let dir = models_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create models directory {}", dir.display()))?;

    for model in MODELS {
        let path = dir.join(model.filename);
        if path.exists() {
            debug!("Model {} already exists", model.name);
            continue;
        }
        match model.url {
            Some(url) => download_model(model, url, &path, progress)?,
            None => warn!(
                "Model {} has no download URL; place {} in {}",
                model.name,
                model.filename,
                dir.display()
            ),
        }
    }

    Ok(())
}

fn download_model(
    model: &ModelInfo,
    url: &str,
    path: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    info!("Downloading model: {}", model.name);

    let mut response =
        reqwest::blocking::get(url).with_context(|| format!("Failed to download {}", model.name))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status: {}", response.status());
    }

    let total = response.content_length();
    let mut bytes = Vec::with_capacity(usize::try_from(total.unwrap_or(0)).unwrap_or(0));
    let mut chunk = [0u8; 64 * 1024];
    loop {
        let n = response
            .read(&mut chunk)
            .with_context(|| format!("Failed to read response for {}", model.name))?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
        if let Some(cb) = progress {
            cb(model.name, bytes.len() as u64, total);
        }
    }

    verify_checksum(model, &bytes, path)?;

    fs::write(path, &bytes).with_context(|| format!("Failed to write {}", model.name))?;

    info!("Downloaded {} ({} bytes)", model.name, bytes.len());
    Ok(())
}

fn verify_checksum(model: &ModelInfo, bytes: &[u8], path: &Path) -> Result<()> {
    let Some(expected) = model.sha256 else {
        debug!("No checksum for {}, skipping verification", model.name);
        return Ok(());
    };

    let hash = format!("{:x}", Sha256::digest(bytes));
    if hash != expected {
        anyhow::bail!(
            "Checksum mismatch for {}: expected {}, got {}. \
             Try deleting {} and re-running to download a fresh copy.",
            model.name,
            expected,
            hash,
            path.display()
        );
    }
    Ok(())
}

/// Checks if all models are installed.
#[must_use]
pub fn all_models_installed() -> bool {
    let dir = models_dir();
    MODELS.iter().all(|m| dir.join(m.filename).exists())
}

/// Lists models with their installed status.
#[must_use]
pub fn list_models() -> Vec<(String, bool)> {
    let dir = models_dir();
    MODELS
        .iter()
        .map(|m| (m.name.to_string(), dir.join(m.filename).exists()))
        .collect()
}
