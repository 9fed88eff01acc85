//! Frame source port for sequential video decoding.

use std::path::Path;

use image::DynamicImage;

/// One step of sequential decoding.
#[derive(Debug, Clone)]
pub enum FrameRead {
    /// A decoded frame.
    Frame(DynamicImage),
    /// The decoder produced an empty or zero-sized frame.
    Degenerate,
    /// No more frames.
    EndOfStream,
}

/// Port for reading frames from an opened video, one at a time.
pub trait FrameSource {
    /// Reads the next frame.
    ///
    /// # Errors
    ///
    /// Returns an error on a decode failure. Callers stop reading the video.
    fn read(&mut self) -> anyhow::Result<FrameRead>;

    /// Releases the underlying decoder.
    ///
    /// # Errors
    ///
    /// Returns an error if cleanup fails.
    fn release(&mut self) -> anyhow::Result<()>;
}

/// Port for opening video files.
pub trait VideoOpener {
    /// Opens a video for frame-sequential decoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or has no video stream.
    fn open(&self, path: &Path) -> anyhow::Result<Box<dyn FrameSource>>;
}
