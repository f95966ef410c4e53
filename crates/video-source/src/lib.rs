//! Touchset Video Source
//!
//! Decodes the session video into RGB frames by index. Backends:
//!
//! - **Ffmpeg:** Pipes `rgb24` raw video out of an `ffmpeg` child process
//! - **Image sequence:** A directory of numbered still images
//! - **Memory:** Pre-decoded frames, for tests and synthetic sessions
//!
//! Sequential reads (`frame == last + 1`) are the hot path of a full-session
//! export and never re-seek. Any other access seeks explicitly. A failure to
//! decode one frame is reported as [`TouchsetError::Decode`] and leaves the
//! source usable for the next frame.

pub mod ffmpeg;
pub mod memory;
pub mod sequence;

use std::path::Path;

use image::RgbImage;
use touchset_common::error::{TouchsetError, TouchsetResult};

pub use ffmpeg::{ffmpeg_available, FfmpegFrameSource};
pub use memory::MemoryFrameSource;
pub use sequence::ImageSequenceSource;

/// Stream properties reported by `open`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub frame_count: i32,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

/// Random-access frame decoder.
pub trait VideoFrameSource: Send {
    /// Stream properties.
    fn info(&self) -> VideoInfo;

    /// Decode frame `frame_index`.
    ///
    /// Returns [`TouchsetError::EndOfStream`] outside `[0, frame_count)` or
    /// past where the stream really ends, and [`TouchsetError::Decode`] when
    /// this particular frame cannot be decoded.
    fn read(&mut self, frame_index: i32) -> TouchsetResult<RgbImage>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

impl<S: VideoFrameSource + ?Sized> VideoFrameSource for Box<S> {
    fn info(&self) -> VideoInfo {
        (**self).info()
    }

    fn read(&mut self, frame_index: i32) -> TouchsetResult<RgbImage> {
        (**self).read(frame_index)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Frame rate assumed for image sequences when none is configured.
pub const DEFAULT_SEQUENCE_FPS: f64 = 30.0;

/// Open the right backend for `path`: directories are image sequences,
/// anything else goes through ffmpeg.
pub fn open_source(
    path: &Path,
    fps_override: Option<f64>,
) -> TouchsetResult<Box<dyn VideoFrameSource>> {
    if !path.exists() {
        return Err(TouchsetError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let source: Box<dyn VideoFrameSource> = if path.is_dir() {
        let fps = fps_override.unwrap_or_else(|| {
            tracing::warn!(
                fps = DEFAULT_SEQUENCE_FPS,
                "No frame rate configured for image sequence, assuming default"
            );
            DEFAULT_SEQUENCE_FPS
        });
        Box::new(ImageSequenceSource::open(path, fps)?)
    } else {
        let source = FfmpegFrameSource::open(path)?;
        match fps_override {
            Some(fps) => Box::new(source.with_fps(fps)),
            None => Box::new(source),
        }
    };

    let info = source.info();
    tracing::info!(
        backend = source.name(),
        frames = info.frame_count,
        fps = info.fps,
        width = info.width,
        height = info.height,
        "Video source opened"
    );
    Ok(source)
}

/// Guard shared by the backends for indices outside the stream.
pub(crate) fn check_bounds(frame_index: i32, frame_count: i32) -> TouchsetResult<()> {
    if frame_index < 0 || frame_index >= frame_count {
        return Err(TouchsetError::EndOfStream { frame: frame_index });
    }
    Ok(())
}
