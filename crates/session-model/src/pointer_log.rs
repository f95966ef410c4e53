//! Sorted pointer event log and frame-to-event matching.

use touchset_common::clock::{FrameClock, MatchDistance};

use crate::calibration::CalibrationOffset;
use crate::event::{PointerEvent, TimestampUs};

/// Immutable, timestamp-sorted sequence of pointer events.
///
/// Sorted ascending with unique timestamps; on duplicate timestamps the
/// first event seen in the input wins.
#[derive(Debug, Clone, Default)]
pub struct PointerEventLog {
    events: Vec<PointerEvent>,
}

impl PointerEventLog {
    /// Build a log from events in arbitrary order.
    pub fn from_events(mut events: Vec<PointerEvent>) -> Self {
        let input_len = events.len();
        // Stable sort keeps input order among equal timestamps, so dedup keeps the first seen.
        events.sort_by_key(|e| e.timestamp_us);
        events.dedup_by_key(|e| e.timestamp_us);

        if events.len() != input_len {
            tracing::debug!(
                dropped = input_len - events.len(),
                "Dropped pointer events with duplicate timestamps"
            );
        }

        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PointerEvent> {
        self.events.iter()
    }

    pub fn get(&self, index: usize) -> Option<&PointerEvent> {
        self.events.get(index)
    }

    pub fn as_slice(&self) -> &[PointerEvent] {
        &self.events
    }

    /// First and last timestamps, if any.
    pub fn time_span(&self) -> Option<(TimestampUs, TimestampUs)> {
        Some((self.events.first()?.timestamp_us, self.events.last()?.timestamp_us))
    }

    /// Event closest to `expected_us`, with its absolute distance.
    ///
    /// O(log n). On an exact tie between the neighbours on either side, the
    /// earlier event is returned.
    pub fn nearest(&self, expected_us: i64) -> Option<(&PointerEvent, u64)> {
        let idx = self
            .events
            .partition_point(|e| (e.timestamp_us as i64) < expected_us);

        let distance = |event: &PointerEvent| {
            MatchDistance {
                expected_us,
                event_us: event.timestamp_us,
            }
            .abs_us()
        };

        let before = idx.checked_sub(1).map(|i| &self.events[i]);
        let after = self.events.get(idx);

        match (before, after) {
            (Some(b), Some(a)) => {
                let (db, da) = (distance(b), distance(a));
                if da < db {
                    Some((a, da))
                } else {
                    Some((b, db))
                }
            }
            (Some(b), None) => Some((b, distance(b))),
            (None, Some(a)) => Some((a, distance(a))),
            (None, None) => None,
        }
    }

    /// Nearest event if its distance is `<= threshold_us`.
    pub fn nearest_within(&self, expected_us: i64, threshold_us: u64) -> Option<&PointerEvent> {
        self.nearest(expected_us)
            .filter(|(_, distance)| *distance <= threshold_us)
            .map(|(event, _)| event)
    }
}

/// Matches video frames to pointer events through a calibration anchor.
#[derive(Debug, Clone, Copy)]
pub struct FrameMatcher<'a> {
    log: &'a PointerEventLog,
    calibration: CalibrationOffset,
    clock: FrameClock,
    threshold_us: u64,
}

impl<'a> FrameMatcher<'a> {
    /// Matcher with the default tolerance of half a frame period.
    pub fn new(log: &'a PointerEventLog, calibration: CalibrationOffset, fps: f64) -> Self {
        let clock = FrameClock::new(fps);
        Self {
            log,
            calibration,
            clock,
            threshold_us: clock.half_frame_us(),
        }
    }

    /// Override the match tolerance.
    pub fn with_threshold_us(mut self, threshold_us: u64) -> Self {
        self.threshold_us = threshold_us;
        self
    }

    pub fn threshold_us(&self) -> u64 {
        self.threshold_us
    }

    pub fn clock(&self) -> FrameClock {
        self.clock
    }

    /// Pointer timestamp at which `frame` is expected to have been captured.
    pub fn expected_timestamp_us(&self, frame: i32) -> i64 {
        self.clock.expected_timestamp_us(
            self.calibration.anchor_frame,
            self.calibration.anchor_timestamp_us,
            frame,
        )
    }

    /// The pointer event for `frame`, if one lies within tolerance.
    pub fn match_frame(&self, frame: i32) -> Option<&'a PointerEvent> {
        self.log
            .nearest_within(self.expected_timestamp_us(frame), self.threshold_us)
    }

    pub fn has_match(&self, frame: i32) -> bool {
        self.match_frame(frame).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn log_of(timestamps: &[u64]) -> PointerEventLog {
        PointerEventLog::from_events(
            timestamps
                .iter()
                .map(|&t| PointerEvent::at(t, t as f32, 0.0))
                .collect(),
        )
    }

    #[test]
    fn test_from_events_sorts_and_keeps_first_duplicate() {
        let log = PointerEventLog::from_events(vec![
            PointerEvent::at(300, 3.0, 0.0),
            PointerEvent::at(100, 1.0, 0.0),
            PointerEvent::at(300, 99.0, 0.0),
            PointerEvent::at(200, 2.0, 0.0),
        ]);
        let ts: Vec<u64> = log.iter().map(|e| e.timestamp_us).collect();
        assert_eq!(ts, vec![100, 200, 300]);
        assert_eq!(log.get(2).unwrap().x, 3.0);
    }

    #[test]
    fn test_nearest_on_empty_log() {
        assert!(log_of(&[]).nearest(1_000).is_none());
    }

    #[test]
    fn test_nearest_picks_closest_neighbour() {
        let log = log_of(&[100, 200, 300]);
        assert_eq!(log.nearest(240).unwrap().0.timestamp_us, 200);
        assert_eq!(log.nearest(260).unwrap().0.timestamp_us, 300);
        assert_eq!(log.nearest(-50).unwrap().0.timestamp_us, 100);
        assert_eq!(log.nearest(10_000).unwrap(), (log.get(2).unwrap(), 9_700));
    }

    #[test]
    fn test_nearest_tie_prefers_earlier() {
        let log = log_of(&[100, 200]);
        assert_eq!(log.nearest(150).unwrap().0.timestamp_us, 100);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let log = log_of(&[1_016_667]);
        assert!(log.nearest_within(1_000_000, 16_667).is_some());
        assert!(log.nearest_within(1_000_000, 16_666).is_none());
    }

    #[test]
    fn test_frame_after_anchor_matches_event_one_period_later() {
        let log = log_of(&[1_000_000, 1_033_333, 1_200_000]);
        let anchor = CalibrationOffset::new(10, 1_000_000);
        let matcher = FrameMatcher::new(&log, anchor, 30.0);

        assert_eq!(matcher.threshold_us(), 16_667);
        assert_eq!(matcher.expected_timestamp_us(11), 1_033_333);
        assert_eq!(matcher.match_frame(11).unwrap().timestamp_us, 1_033_333);
        assert_eq!(matcher.match_frame(10).unwrap().timestamp_us, 1_000_000);
        assert!(matcher.match_frame(13).is_none());
    }

    #[test]
    fn test_custom_threshold() {
        let log = log_of(&[1_010_000]);
        let matcher = FrameMatcher::new(&log, CalibrationOffset::new(0, 1_000_000), 30.0);
        assert!(matcher.has_match(0));
        assert!(!matcher.with_threshold_us(5_000).has_match(0));
    }

    proptest! {
        #[test]
        fn prop_nearest_matches_linear_scan(
            mut timestamps in proptest::collection::vec(0u64..1_000_000, 0..64),
            expected in -10_000i64..1_010_000,
            threshold in 0u64..50_000,
        ) {
            let log = log_of(&timestamps);
            timestamps.sort_unstable();
            timestamps.dedup();

            let best = timestamps
                .iter()
                .map(|&t| (t as i64 - expected).unsigned_abs())
                .min();

            let found = log.nearest(expected).map(|(_, d)| d);
            prop_assert_eq!(found, best);

            let within = log.nearest_within(expected, threshold);
            match best {
                Some(d) if d <= threshold => {
                    let event = within.unwrap();
                    prop_assert_eq!((event.timestamp_us as i64 - expected).unsigned_abs(), d);
                }
                _ => prop_assert!(within.is_none()),
            }
        }
    }
}
