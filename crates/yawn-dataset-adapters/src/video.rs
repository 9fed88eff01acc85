//! Video frame source using FFmpeg.
//!
//! Decodes the best video stream of a file sequentially and converts every
//! frame to RGB24 in memory.

use std::path::Path;

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use image::{DynamicImage, RgbImage};
use tracing::{debug, trace};
use yawn_dataset_core::ports::{FrameRead, FrameSource, VideoOpener};

/// Opens videos with FFmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegVideoOpener;

impl FfmpegVideoOpener {
    /// Initializes FFmpeg.
    ///
    /// # Errors
    ///
    /// Returns an error if FFmpeg fails to initialize.
    pub fn new() -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        Ok(Self)
    }
}

impl VideoOpener for FfmpegVideoOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegFrameSource::new(path)?))
    }
}

struct FfmpegFrameSource {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    flushed: bool,
    frames: u64,
}

impl FfmpegFrameSource {
    fn new(path: &Path) -> Result<Self> {
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open '{}' with ffmpeg", path.display()))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        debug!(
            width = decoder.width(),
            height = decoder.height(),
            "Opened {}",
            path.display()
        );

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            flushed: false,
            frames: 0,
        })
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<FrameRead> {
        if decoded.width() == 0 || decoded.height() == 0 {
            return Ok(FrameRead::Degenerate);
        }
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
        self.frames += 1;

        Ok(RgbImage::from_raw(width, height, pixels)
            .map_or(FrameRead::Degenerate, |img| {
                FrameRead::Frame(DynamicImage::ImageRgb8(img))
            }))
    }
}

impl FrameSource for FfmpegFrameSource {
    fn read(&mut self) -> Result<FrameRead> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded);
            }
            if self.flushed {
                return Ok(FrameRead::EndOfStream);
            }

            match self.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    self.decoder
                        .send_packet(&packet)
                        .context("send packet to ffmpeg decoder")?;
                }
                None => {
                    self.decoder.send_eof().context("flush ffmpeg decoder")?;
                    self.flushed = true;
                }
            }
        }
    }

    fn release(&mut self) -> Result<()> {
        trace!(frames = self.frames, "Releasing decoder");
        self.decoder.flush();
        self.flushed = true;
        Ok(())
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let len = row_bytes * height as usize;
        let pixels = data
            .get(..len)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((pixels.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
