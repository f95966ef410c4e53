//! Clock calibration between the video and the pointer stream.

use serde::{Deserialize, Serialize};

use crate::event::TimestampUs;
use crate::pointer_log::PointerEventLog;

/// The anchor pair relating the video frame clock to the pointer clock.
///
/// Established once per session by marking a frame where the stylus
/// visibly lands against the pointer sample recorded at that instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationOffset {
    pub anchor_frame: i32,
    pub anchor_timestamp_us: TimestampUs,
}

impl CalibrationOffset {
    pub fn new(anchor_frame: i32, anchor_timestamp_us: TimestampUs) -> Self {
        Self {
            anchor_frame,
            anchor_timestamp_us,
        }
    }

    /// Pin `frame` to the timestamp of the `event_index`-th event in the log.
    pub fn from_event_index(
        frame: i32,
        log: &PointerEventLog,
        event_index: usize,
    ) -> Option<Self> {
        log.get(event_index)
            .map(|event| Self::new(frame, event.timestamp_us))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PointerEvent;

    #[test]
    fn test_from_event_index() {
        let log = PointerEventLog::from_events(vec![
            PointerEvent::at(500, 0.0, 0.0),
            PointerEvent::at(100, 0.0, 0.0),
        ]);
        let anchor = CalibrationOffset::from_event_index(42, &log, 1).unwrap();
        assert_eq!(anchor, CalibrationOffset::new(42, 500));
        assert!(CalibrationOffset::from_event_index(42, &log, 2).is_none());
    }

    #[test]
    fn test_serde_field_names() {
        let json = serde_json::to_string(&CalibrationOffset::new(10, 1_000_000)).unwrap();
        assert_eq!(json, r#"{"anchor_frame":10,"anchor_timestamp_us":1000000}"#);
    }
}
