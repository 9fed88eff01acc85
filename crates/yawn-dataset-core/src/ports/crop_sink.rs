//! Crop sink port for persisting labeled face crops.

use image::DynamicImage;

use crate::domain::MouthClass;

/// Port for writing face crops into class directories.
pub trait CropSink {
    /// Persists a crop under the directory for `class`.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be encoded or written.
    fn save(&self, class: MouthClass, file_name: &str, image: &DynamicImage) -> anyhow::Result<()>;
}
