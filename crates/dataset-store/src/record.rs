//! Per-record attribute types.

use serde::{Deserialize, Serialize};

/// Pointer position attached to a record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchedPoint {
    /// A pointer event matched the frame; canvas pixels.
    Matched { x: f32, y: f32 },
    /// No pointer event within tolerance.
    #[default]
    Unmatched,
}

impl MatchedPoint {
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    pub fn position(&self) -> Option<(f32, f32)> {
        match self {
            Self::Matched { x, y } => Some((*x, *y)),
            Self::Unmatched => None,
        }
    }
}

impl From<Option<(f32, f32)>> for MatchedPoint {
    fn from(position: Option<(f32, f32)>) -> Self {
        match position {
            Some((x, y)) => Self::Matched { x, y },
            None => Self::Unmatched,
        }
    }
}

/// The `attributes` channel entry for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordAttributes {
    /// Touch / no-touch.
    pub label: bool,
    pub point: MatchedPoint,
}

impl RecordAttributes {
    pub fn new(label: bool, point: MatchedPoint) -> Self {
        Self { label, point }
    }
}
