//! Frame normalization to fixed-size square tensors.
//!
//! A raw frame of any aspect ratio is conceptually centered on a black
//! `S0 x S0` canvas (`S0 = max(width, height)`), rotated by a quarter turn
//! about the canvas centre and scaled by `S / S0`. Rotation and scale are
//! folded into one inverse-mapped affine transform, so each output pixel
//! is sampled from the source exactly once and the padded canvas is never
//! materialized.

use image::RgbImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use touchset_common::error::{TouchsetError, TouchsetResult};

/// Quarter-turn rotation, counter-clockwise for positive degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Accepts any multiple of 90; negative angles wrap (`-90` is `Deg270`).
    ///
    /// Arbitrary angles would clip the corners of the letterboxed canvas
    /// and are rejected.
    pub fn from_degrees(degrees: i32) -> TouchsetResult<Self> {
        if degrees % 90 != 0 {
            return Err(TouchsetError::unsupported(format!(
                "rotation must be a multiple of 90 degrees, got {degrees}"
            )));
        }
        Ok(match degrees.rem_euclid(360) {
            0 => Self::Deg0,
            90 => Self::Deg90,
            180 => Self::Deg180,
            _ => Self::Deg270,
        })
    }

    pub fn degrees(&self) -> i32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Exact `(cos, sin)` of the angle.
    fn cos_sin(&self) -> (f32, f32) {
        match self {
            Self::Deg0 => (1.0, 0.0),
            Self::Deg90 => (0.0, 1.0),
            Self::Deg180 => (-1.0, 0.0),
            Self::Deg270 => (0.0, -1.0),
        }
    }
}

/// Row-major `[S, S, 3]` float image with values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTensor {
    side: u32,
    data: Vec<f32>,
}

impl FrameTensor {
    /// Wrap existing data. Fails unless `data.len() == side * side * 3`.
    pub fn from_vec(side: u32, data: Vec<f32>) -> TouchsetResult<Self> {
        let expected = side as usize * side as usize * 3;
        if data.len() != expected {
            return Err(TouchsetError::processing(format!(
                "tensor of side {side} needs {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Self { side, data })
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.side as usize, self.side as usize, 3]
    }

    /// Total number of values (`S * S * 3`).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        let i = (y as usize * self.side as usize + x as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// Pads, rotates and scales frames to a fixed square tensor.
#[derive(Debug, Clone, Copy)]
pub struct FrameNormalizer {
    target_size: u32,
}

impl FrameNormalizer {
    pub fn new(target_size: u32) -> TouchsetResult<Self> {
        if target_size == 0 {
            return Err(TouchsetError::config("target size must be positive"));
        }
        Ok(Self { target_size })
    }

    pub fn target_size(&self) -> u32 {
        self.target_size
    }

    /// Normalize `frame` into an `S x S x 3` tensor.
    pub fn normalize(&self, frame: &RgbImage, rotation: Rotation) -> TouchsetResult<FrameTensor> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(TouchsetError::processing("cannot normalize an empty frame"));
        }

        let side = self.target_size as usize;
        let canvas = width.max(height) as f32;
        let scale = canvas / self.target_size as f32;
        let offset_x = ((width.max(height) - width) / 2) as f32;
        let offset_y = ((width.max(height) - height) / 2) as f32;
        let center = canvas / 2.0;
        let (cos, sin) = rotation.cos_sin();
        tracing::trace!(width, height, side, rotation = rotation.degrees(), "Normalizing frame");

        let mut data = vec![0.0f32; side * side * 3];
        data.par_chunks_mut(side * 3)
            .enumerate()
            .for_each(|(v, row)| {
                let qy = (v as f32 + 0.5) * scale - center;
                for u in 0..side {
                    let qx = (u as f32 + 0.5) * scale - center;
                    // Output -> canvas: inverse rotation about the canvas centre.
                    let cx = qx * cos - qy * sin + center;
                    let cy = qx * sin + qy * cos + center;
                    // Canvas -> source pixel grid (pixel centres at +0.5).
                    let sx = cx - offset_x - 0.5;
                    let sy = cy - offset_y - 0.5;
                    let rgb = sample_bilinear(frame, sx, sy);
                    let out = &mut row[u * 3..u * 3 + 3];
                    out[0] = rgb[0] / 255.0;
                    out[1] = rgb[1] / 255.0;
                    out[2] = rgb[2] / 255.0;
                }
            });

        Ok(FrameTensor {
            side: self.target_size,
            data,
        })
    }
}

/// Bilinear sample in source pixel coordinates; outside the frame is black.
fn sample_bilinear(frame: &RgbImage, x: f32, y: f32) -> [f32; 3] {
    let (width, height) = frame.dimensions();
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let texel = |px: i64, py: i64| -> [f32; 3] {
        if px < 0 || py < 0 || px >= width as i64 || py >= height as i64 {
            return [0.0; 3];
        }
        let p = frame.get_pixel(px as u32, py as u32).0;
        [p[0] as f32, p[1] as f32, p[2] as f32]
    };

    let mut acc = [0.0f32; 3];
    for (px, py, weight) in [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ] {
        if weight == 0.0 {
            continue;
        }
        let t = texel(px, py);
        for c in 0..3 {
            acc[c] += t[c] * weight;
        }
    }
    acc
}
