//! Pointer event types for the Touchset event stream.
//!
//! Events arrive from the stroke-capture side as JSONL, one sample per line.
//! Coordinates are canvas pixels; tilt is in degrees as reported by the
//! stylus driver. Lines starting with `#` carry stream metadata and are
//! skipped by the parser.

use serde::{Deserialize, Serialize};

pub use touchset_common::clock::TimestampUs;

/// A single stylus/touch sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Canvas X coordinate in pixels.
    pub x: f32,
    /// Canvas Y coordinate in pixels.
    pub y: f32,
    /// Normalized pressure `[0.0, 1.0]`.
    #[serde(default)]
    pub pressure: f32,
    #[serde(default, rename = "tiltX")]
    pub tilt_x: f32,
    #[serde(default, rename = "tiltY")]
    pub tilt_y: f32,
    /// Monotonic microseconds since session start.
    #[serde(rename = "t")]
    pub timestamp_us: TimestampUs,
}

impl PointerEvent {
    /// Create an event with zero pressure and tilt.
    pub fn at(timestamp_us: TimestampUs, x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            pressure: 0.0,
            tilt_x: 0.0,
            tilt_y: 0.0,
            timestamp_us,
        }
    }

    pub fn with_pressure(mut self, pressure: f32) -> Self {
        self.pressure = pressure;
        self
    }

    pub fn with_tilt(mut self, tilt_x: f32, tilt_y: f32) -> Self {
        self.tilt_x = tilt_x;
        self.tilt_y = tilt_y;
        self
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    /// Timestamp as fractional seconds since session start.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_us as f64 / 1_000_000.0
    }
}

/// Parse events from JSONL content (one JSON object per line).
pub fn parse_pointer_events(jsonl: &str) -> Result<Vec<PointerEvent>, serde_json::Error> {
    jsonl
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(serde_json::from_str)
        .collect()
}

/// Serialize events to JSONL format.
pub fn serialize_pointer_events(events: &[PointerEvent]) -> Result<String, serde_json::Error> {
    let mut output = String::new();
    for event in events {
        output.push_str(&serde_json::to_string(event)?);
        output.push('\n');
    }
    Ok(output)
}
