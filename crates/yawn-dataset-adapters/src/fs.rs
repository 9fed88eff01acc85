//! Filesystem adapter for discovering dataset videos.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use yawn_dataset_core::domain::Video;

/// Supported video extensions.
const VIDEO_EXTENSIONS: &[&str] = &["avi"];

/// Filesystem video source.
///
/// Walks a dataset tree and numbers every video from 1 in sorted path order.
pub struct FsVideoSource {
    root: PathBuf,
    recursive: bool,
}

impl FsVideoSource {
    /// Creates a source rooted at `root`.
    ///
    /// # Arguments
    ///
    /// * `root` - A video file or a directory to scan
    /// * `recursive` - Whether to recurse into subdirectories
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, recursive: bool) -> Self {
        Self {
            root: root.into(),
            recursive,
        }
    }

    /// Lists the videos with their ids.
    #[must_use]
    pub fn videos(&self) -> Vec<Video> {
        let mut files = Vec::new();
        if self.root.is_file() {
            if is_supported_video(&self.root) {
                files.push(self.root.clone());
            } else {
                warn!("Unsupported file type: {}", self.root.display());
            }
        } else if self.root.is_dir() {
            self.collect_from_dir(&self.root, &mut files);
        } else {
            warn!("Path does not exist: {}", self.root.display());
        }

        files.sort();
        debug!("Found {} video files", files.len());

        (1u32..).zip(files).map(|(id, path)| Video::new(id, path)).collect()
    }

    fn collect_from_dir(&self, dir: &Path, files: &mut Vec<PathBuf>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!("Failed to read directory {}: {e}", dir.display());
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && is_supported_video(&path) {
                files.push(path);
            } else if path.is_dir() && self.recursive {
                self.collect_from_dir(&path, files);
            }
        }
    }
}

/// Checks if a path has a supported video extension.
fn is_supported_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_supported_video() {
        assert!(is_supported_video(Path::new("1-Female-Yawning.avi")));
        assert!(is_supported_video(Path::new("clip.AVI")));
        assert!(!is_supported_video(Path::new("clip.mp4")));
        assert!(!is_supported_video(Path::new("avi")));
    }
}
