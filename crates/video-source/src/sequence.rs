//! Image-sequence frame source.
//!
//! Frame `i` is the `i`-th image file in the directory, ordered by file
//! name (zero-padded names such as `frame_000123.png` sort correctly).

use std::path::{Path, PathBuf};

use image::RgbImage;
use touchset_common::error::{TouchsetError, TouchsetResult};

use crate::{check_bounds, VideoFrameSource, VideoInfo};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// A directory of still frames played back at a fixed rate.
pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    fps: f64,
    width: u32,
    height: u32,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>, fps: f64) -> TouchsetResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(TouchsetError::FileNotFound { path: dir });
        }
        if !(fps.is_finite() && fps > 0.0) {
            return Err(TouchsetError::video(format!("Invalid frame rate: {fps}")));
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                        .unwrap_or(false)
            })
            .collect();
        files.sort();

        // Geometry comes from the first readable header; unreadable files fail on read.
        let (width, height) = files
            .iter()
            .find_map(|path| image::image_dimensions(path).ok())
            .unwrap_or((0, 0));

        Ok(Self {
            dir,
            files,
            fps,
            width,
            height,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl VideoFrameSource for ImageSequenceSource {
    fn info(&self) -> VideoInfo {
        VideoInfo {
            frame_count: self.files.len() as i32,
            fps: self.fps,
            width: self.width,
            height: self.height,
        }
    }

    fn read(&mut self, frame_index: i32) -> TouchsetResult<RgbImage> {
        check_bounds(frame_index, self.files.len() as i32)?;
        let path = &self.files[frame_index as usize];
        image::open(path)
            .map(|img| img.to_rgb8())
            .map_err(|e| TouchsetError::decode(frame_index, format!("{}: {e}", path.display())))
    }

    fn name(&self) -> &str {
        "image-sequence"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_sequence_reads_in_name_order_and_reports_corrupt_frames() {
        let dir = std::env::temp_dir().join("touchset_test_sequence");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        for (i, shade) in [10u8, 20, 30].iter().enumerate() {
            RgbImage::from_pixel(4, 3, Rgb([*shade, 0, 0]))
                .save(dir.join(format!("frame_{i:06}.png")))
                .unwrap();
        }
        std::fs::write(dir.join("frame_000003.png"), b"not a png").unwrap();
        std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let mut source = ImageSequenceSource::open(&dir, 30.0).unwrap();
        let info = source.info();
        assert_eq!(info.frame_count, 4);
        assert_eq!((info.width, info.height), (4, 3));

        assert_eq!(source.read(2).unwrap().get_pixel(0, 0).0, [30, 0, 0]);
        assert_eq!(source.read(0).unwrap().get_pixel(0, 0).0, [10, 0, 0]);
        let err = source.read(3).unwrap_err();
        assert!(matches!(err, TouchsetError::Decode { frame: 3, .. }));
        assert!(matches!(
            source.read(4),
            Err(TouchsetError::EndOfStream { frame: 4 })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_rejects_invalid_fps() {
        let dir = std::env::temp_dir();
        assert!(ImageSequenceSource::open(&dir, 0.0).is_err());
    }
}
