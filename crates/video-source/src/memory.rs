//! In-memory frame source.

use image::{Rgb, RgbImage};
use touchset_common::error::{TouchsetError, TouchsetResult};

use crate::{check_bounds, VideoFrameSource, VideoInfo};

/// Pre-decoded frames. `None` slots fail with a decode error when read.
pub struct MemoryFrameSource {
    frames: Vec<Option<RgbImage>>,
    fps: f64,
    width: u32,
    height: u32,
    last_read: Option<i32>,
    seeks: u64,
}

impl MemoryFrameSource {
    pub fn new(frames: Vec<Option<RgbImage>>, fps: f64) -> Self {
        let (width, height) = frames
            .iter()
            .flatten()
            .next()
            .map(|f| f.dimensions())
            .unwrap_or((0, 0));
        Self {
            frames,
            fps,
            width,
            height,
            last_read: None,
            seeks: 0,
        }
    }

    /// `count` frames of one solid colour.
    pub fn solid(count: usize, width: u32, height: u32, rgb: [u8; 3], fps: f64) -> Self {
        let frame = RgbImage::from_pixel(width, height, Rgb(rgb));
        Self::new(vec![Some(frame); count], fps)
    }

    /// Make `frame_index` undecodable.
    pub fn with_decode_failure(mut self, frame_index: usize) -> Self {
        if let Some(slot) = self.frames.get_mut(frame_index) {
            *slot = None;
        }
        self
    }

    /// Number of non-sequential reads so far.
    pub fn seek_count(&self) -> u64 {
        self.seeks
    }
}

impl VideoFrameSource for MemoryFrameSource {
    fn info(&self) -> VideoInfo {
        VideoInfo {
            frame_count: self.frames.len() as i32,
            fps: self.fps,
            width: self.width,
            height: self.height,
        }
    }

    fn read(&mut self, frame_index: i32) -> TouchsetResult<RgbImage> {
        check_bounds(frame_index, self.frames.len() as i32)?;

        if self.last_read.map(|last| last + 1) != Some(frame_index) {
            self.seeks += 1;
        }
        self.last_read = Some(frame_index);

        self.frames[frame_index as usize]
            .clone()
            .ok_or_else(|| TouchsetError::decode(frame_index, "frame marked undecodable"))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_failure_slot() {
        let mut source = MemoryFrameSource::solid(4, 2, 2, [9, 9, 9], 30.0).with_decode_failure(2);
        assert!(source.read(1).is_ok());
        let err = source.read(2).unwrap_err();
        assert!(err.is_recoverable());
        assert!(source.read(3).is_ok());
    }

    #[test]
    fn test_sequential_reads_do_not_seek() {
        let mut source = MemoryFrameSource::solid(10, 1, 1, [0, 0, 0], 30.0);
        for frame in 3..10 {
            source.read(frame).unwrap();
        }
        assert_eq!(source.seek_count(), 1);
        source.read(0).unwrap();
        assert_eq!(source.seek_count(), 2);
    }
}
