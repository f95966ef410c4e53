//! Automatic touch labels from pointer-match presence.

use std::ops::Range;

use touchset_session_model::{CalibrationOffset, FrameMatcher, PointerEventLog, StateChangeLog};

/// Build a state log that is `true` exactly where frames have a pointer match.
///
/// `tolerance_us` overrides the default half-frame tolerance.
pub fn derive_labels(
    log: &PointerEventLog,
    calibration: CalibrationOffset,
    fps: f64,
    range: Range<i32>,
    tolerance_us: Option<u64>,
) -> StateChangeLog {
    let mut matcher = FrameMatcher::new(log, calibration, fps);
    if let Some(tolerance) = tolerance_us {
        matcher = matcher.with_threshold_us(tolerance);
    }

    let labels = StateChangeLog::derive_automatic(range.clone(), |frame| matcher.has_match(frame));
    tracing::debug!(
        start = range.start,
        end = range.end,
        entries = labels.len(),
        threshold_us = matcher.threshold_us(),
        "Derived automatic labels"
    );
    labels
}
