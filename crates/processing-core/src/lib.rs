//! Touchset Processing Core
//!
//! Turns decoded video frames into model-ready tensors:
//! - **Letterboxing:** Center any aspect ratio on a black square canvas
//! - **Rotation:** Quarter-turn orientation correction
//! - **Scaling:** One combined affine resample to a fixed `S x S` tensor
//!
//! Pure computation: no I/O and no platform dependencies.
//! All inputs are data; all outputs are data.

pub mod normalize;

pub use normalize::{FrameNormalizer, FrameTensor, Rotation};
