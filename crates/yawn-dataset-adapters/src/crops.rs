//! JPEG crop sink writing one directory per mouth class.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};
use yawn_dataset_core::domain::MouthClass;
use yawn_dataset_core::ports::CropSink;

/// Writes crops to `<root>/opened` and `<root>/closed`.
pub struct FsCropSink {
    root: PathBuf,
}

impl FsCropSink {
    /// Creates the class directories under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for class in [MouthClass::Opened, MouthClass::Closed] {
            let dir = root.join(class.dir_name());
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(Self { root })
    }

    /// Output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding crops of `class`.
    #[must_use]
    pub fn class_dir(&self, class: MouthClass) -> PathBuf {
        self.root.join(class.dir_name())
    }
}

impl CropSink for FsCropSink {
    fn save(&self, class: MouthClass, file_name: &str, image: &DynamicImage) -> Result<()> {
        let path = self.class_dir(class).join(file_name);
        image
            .save_with_format(&path, ImageFormat::Jpeg)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}
