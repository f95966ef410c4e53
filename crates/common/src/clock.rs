//! Clock and timing utilities for stream alignment.
//!
//! A session has two clocks: the video's frame clock (fixed fps) and the
//! pointer stream's monotonic microsecond clock. A single calibration
//! anchor pins one frame to one pointer timestamp; everything else is
//! derived from the frame rate. This module provides:
//! - Frame index to milliseconds conversion
//! - Expected pointer timestamp for a frame given an anchor
//! - The default match tolerance (half a frame period)
//! - A cadence controller for progress reports

/// Monotonic pointer timestamp in microseconds since session start.
pub type TimestampUs = u64;

/// Converts between frame indices and the pointer clock for a fixed fps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    fps: f64,
}

impl FrameClock {
    /// Create a clock for the given frame rate. Non-positive rates clamp to 1 fps.
    pub fn new(fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 1.0 };
        Self { fps }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// `frame * 1000 / fps`.
    pub fn frame_time_ms(&self, frame: i32) -> f64 {
        frame as f64 * 1000.0 / self.fps
    }

    /// Frame period in microseconds (unrounded).
    pub fn frame_period_us(&self) -> f64 {
        1_000_000.0 / self.fps
    }

    /// Half a frame period, rounded to the nearest microsecond.
    ///
    /// fps 30 gives 16,667.
    pub fn half_frame_us(&self) -> u64 {
        (self.frame_period_us() / 2.0).round() as u64
    }

    /// Expected pointer timestamp for `frame`, given the anchor pair.
    ///
    /// `anchor_ts + (frame_time_ms(frame) - frame_time_ms(anchor_frame)) * 1000`,
    /// rounded to the nearest microsecond. Frames before the anchor may land
    /// before the pointer epoch, hence the signed result.
    pub fn expected_timestamp_us(
        &self,
        anchor_frame: i32,
        anchor_ts: TimestampUs,
        frame: i32,
    ) -> i64 {
        let delta_ms = self.frame_time_ms(frame) - self.frame_time_ms(anchor_frame);
        anchor_ts as i64 + (delta_ms * 1000.0).round() as i64
    }

    /// Nearest frame whose expected timestamp is closest to `timestamp`.
    pub fn frame_for_timestamp(
        &self,
        anchor_frame: i32,
        anchor_ts: TimestampUs,
        timestamp: TimestampUs,
    ) -> i32 {
        let delta_us = timestamp as f64 - anchor_ts as f64;
        anchor_frame + (delta_us / self.frame_period_us()).round() as i32
    }
}

/// Signed distance between a pointer event and a frame's expected instant.
#[derive(Debug, Clone, Copy)]
pub struct MatchDistance {
    /// Expected timestamp of the frame (µs, may be negative).
    pub expected_us: i64,
    /// Timestamp of the candidate pointer event (µs).
    pub event_us: TimestampUs,
}

impl MatchDistance {
    /// Offset in microseconds (positive = event is after the frame instant).
    pub fn offset_us(&self) -> i64 {
        self.event_us as i64 - self.expected_us
    }

    /// Absolute distance in microseconds.
    pub fn abs_us(&self) -> u64 {
        self.offset_us().unsigned_abs()
    }

    /// Whether the event is within the tolerance. The boundary is inclusive.
    pub fn within(&self, threshold_us: u64) -> bool {
        self.abs_us() <= threshold_us
    }
}

/// Emits a report every N attempted items.
#[derive(Debug)]
pub struct ProgressCadence {
    every: u64,
    last_reported: Option<u64>,
}

impl ProgressCadence {
    /// Create a cadence reporting every `every` items (0 is treated as 1).
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            last_reported: None,
        }
    }

    /// Returns true when `attempted` crosses the next reporting boundary.
    pub fn should_report(&mut self, attempted: u64) -> bool {
        if attempted == 0 || attempted % self.every != 0 {
            return false;
        }
        if self.last_reported == Some(attempted) {
            return false;
        }
        self.last_reported = Some(attempted);
        true
    }

    pub fn every(&self) -> u64 {
        self.every
    }
}
