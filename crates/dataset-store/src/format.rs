//! On-disk encoding shared by the writer and reader.

use serde::{Deserialize, Serialize};

use crate::record::{MatchedPoint, RecordAttributes};

pub const MAGIC: &[u8; 4] = b"TSDS";
pub const FORMAT_VERSION: u16 = 1;

pub const TAG_SCHEMA: u8 = b'S';
pub const TAG_CHUNK: u8 = b'C';
pub const TAG_END: u8 = b'E';

/// Values per `attributes` record: `[label, x, y]`.
pub const ATTRIBUTE_LEN: usize = 3;

/// Schema block, fixed by the first record of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub format_version: u16,

    /// Shape of one `images` record: `[1, W * H * 3]`.
    pub image_shape: [usize; 2],

    /// Side length `S` of the square source tensor.
    pub image_side: u32,

    pub channels: u32,

    pub attribute_names: Vec<String>,

    /// Wall-clock creation time (ISO 8601).
    pub created_at: String,
}

impl DatasetSchema {
    pub fn for_side(image_side: u32) -> Self {
        let side = image_side as usize;
        Self {
            format_version: FORMAT_VERSION,
            image_shape: [1, side * side * 3],
            image_side,
            channels: 3,
            attribute_names: vec!["label".to_string(), "x".to_string(), "y".to_string()],
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Values per `images` record.
    pub fn image_len(&self) -> usize {
        self.image_shape[1]
    }

    /// Bytes per record across both channels.
    pub fn record_bytes(&self) -> usize {
        (self.image_len() + ATTRIBUTE_LEN) * 4
    }
}

/// Collapse attributes to the storage convention: `[0|1, x|NaN, y|NaN]`.
pub fn encode_attributes(attrs: &RecordAttributes) -> [f32; ATTRIBUTE_LEN] {
    let label = if attrs.label { 1.0 } else { 0.0 };
    match attrs.point {
        MatchedPoint::Matched { x, y } => [label, x, y],
        MatchedPoint::Unmatched => [label, f32::NAN, f32::NAN],
    }
}

pub fn decode_attributes(values: [f32; ATTRIBUTE_LEN]) -> RecordAttributes {
    let [label, x, y] = values;
    let point = if x.is_nan() || y.is_nan() {
        MatchedPoint::Unmatched
    } else {
        MatchedPoint::Matched { x, y }
    };
    RecordAttributes {
        label: label >= 0.5,
        point,
    }
}

pub(crate) fn extend_f32_le(out: &mut Vec<u8>, values: &[f32]) {
    out.reserve(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

pub(crate) fn f32s_from_le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
