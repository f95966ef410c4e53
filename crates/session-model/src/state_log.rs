//! Run-length-encoded touch state per frame.
//!
//! The log stores only the frames where the label changes. Every other
//! frame takes the value of the nearest entry at or before it, and frames
//! before the first entry are `false`.

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Sparse sorted map from frame index to touch state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateChangeLog {
    entries: BTreeMap<i32, bool>,
}

impl StateChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert the state at `frame`, replacing any entry already there.
    pub fn set(&mut self, frame: i32, value: bool) {
        self.entries.insert(frame, value);
    }

    /// Remove the entry at exactly `frame`, returning its value.
    pub fn remove(&mut self, frame: i32) -> Option<bool> {
        self.entries.remove(&frame)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// State at `frame`: value of the greatest entry `<= frame`, else `false`.
    pub fn query_at(&self, frame: i32) -> bool {
        self.entries
            .range(..=frame)
            .next_back()
            .map(|(_, value)| *value)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, bool)> + '_ {
        self.entries.iter().map(|(frame, value)| (*frame, *value))
    }

    /// Point-in-time copy for an export; later edits do not affect it.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Derive the log from where pointer data exists.
    ///
    /// Walks `range` in order and records `true` on each no-match to match
    /// transition and `false` on each match to no-match transition. A run
    /// still active at the end is closed with `false` at `range.end`.
    pub fn derive_automatic(range: Range<i32>, mut has_match: impl FnMut(i32) -> bool) -> Self {
        let mut log = Self::new();
        if range.is_empty() {
            return log;
        }

        let end = range.end;
        let mut active = false;
        for frame in range {
            let matched = has_match(frame);
            if matched != active {
                log.set(frame, matched);
                active = matched;
            }
        }
        if active {
            log.set(end, false);
        }

        log
    }

    /// Maximal runs of equal state inside `range`, as `(start, end, value)`
    /// with `end` exclusive.
    pub fn segments(&self, range: Range<i32>) -> Vec<(i32, i32, bool)> {
        let mut runs = Vec::new();
        if range.is_empty() {
            return runs;
        }

        let mut start = range.start;
        let mut value = self.query_at(range.start);
        for (&frame, &next) in self.entries.range(range.start + 1..range.end) {
            if next != value {
                runs.push((start, frame, value));
                start = frame;
                value = next;
            }
        }
        runs.push((start, range.end, value));
        runs
    }

    /// Number of frames in `range` labelled `true`.
    pub fn count_true(&self, range: Range<i32>) -> u64 {
        self.segments(range)
            .into_iter()
            .filter(|(_, _, value)| *value)
            .map(|(start, end, _)| (end - start) as u64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_query_defaults_to_false() {
        let log = StateChangeLog::new();
        assert!(!log.query_at(0));
        assert!(!log.query_at(-5));
    }

    #[test]
    fn test_predecessor_semantics() {
        let mut log = StateChangeLog::new();
        log.set(10, true);
        log.set(20, false);
        assert!(!log.query_at(9));
        assert!(log.query_at(10));
        assert!(log.query_at(19));
        assert!(!log.query_at(20));
        assert!(!log.query_at(1_000));
    }

    #[test]
    fn test_set_replaces_exact_entry() {
        let mut log = StateChangeLog::new();
        log.set(5, true);
        log.set(5, false);
        assert_eq!(log.len(), 1);
        assert!(!log.query_at(5));
    }

    #[test]
    fn test_clear() {
        let mut log = StateChangeLog::new();
        log.set(1, true);
        log.clear();
        assert!(log.is_empty());
        assert!(!log.query_at(1));
    }

    #[test]
    fn test_derive_empty_range_is_empty() {
        let log = StateChangeLog::derive_automatic(5..5, |_| true);
        assert!(log.is_empty());
    }

    #[test]
    fn test_derive_closes_active_run_at_range_end() {
        let log = StateChangeLog::derive_automatic(0..10, |f| f >= 3);
        let entries: Vec<_> = log.iter().collect();
        assert_eq!(entries, vec![(3, true), (10, false)]);
    }

    #[test]
    fn test_derive_minimal_runs() {
        let matches = [false, true, true, false, false, true, false];
        let log = StateChangeLog::derive_automatic(0..7, |f| matches[f as usize]);
        let entries: Vec<_> = log.iter().collect();
        assert_eq!(entries, vec![(1, true), (3, false), (5, true), (6, false)]);
        for (frame, expected) in matches.iter().enumerate() {
            assert_eq!(log.query_at(frame as i32), *expected);
        }
    }

    #[test]
    fn test_derive_never_matched_is_empty() {
        assert!(StateChangeLog::derive_automatic(0..100, |_| false).is_empty());
    }

    #[test]
    fn test_segments_and_count() {
        let mut log = StateChangeLog::new();
        log.set(2, true);
        log.set(4, true);
        log.set(6, false);
        assert_eq!(log.segments(0..8), vec![(0, 2, false), (2, 6, true), (6, 8, false)]);
        assert_eq!(log.count_true(0..8), 4);
        assert_eq!(log.segments(3..5), vec![(3, 5, true)]);
    }

    #[test]
    fn test_json_roundtrip_keeps_integer_keys() {
        let mut log = StateChangeLog::new();
        log.set(-3, true);
        log.set(12, false);
        let json = serde_json::to_string(&log).unwrap();
        let parsed: StateChangeLog = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, log);
    }

    proptest! {
        #[test]
        fn prop_query_constant_between_entries(
            entries in proptest::collection::btree_map(-100i32..100, any::<bool>(), 0..20),
            f1 in -120i32..120,
            f2 in -120i32..120,
        ) {
            let mut log = StateChangeLog::new();
            for (frame, value) in &entries {
                log.set(*frame, *value);
            }
            let (lo, hi) = if f1 <= f2 { (f1, f2) } else { (f2, f1) };
            let between = entries.range(lo + 1..=hi).next().is_some();
            if !between {
                prop_assert_eq!(log.query_at(lo), log.query_at(hi));
            }
        }

        #[test]
        fn prop_derive_alternates_and_is_bounded(
            matches in proptest::collection::vec(any::<bool>(), 0..200),
        ) {
            let n = matches.len() as i32;
            let log = StateChangeLog::derive_automatic(0..n, |f| matches[f as usize]);

            let values: Vec<bool> = log.iter().map(|(_, v)| v).collect();
            for pair in values.windows(2) {
                prop_assert_ne!(pair[0], pair[1]);
            }

            // Frames before the range count as "no match".
            let mut prev = false;
            let mut transitions = 0usize;
            for &m in &matches {
                if m != prev {
                    transitions += 1;
                    prev = m;
                }
            }
            prop_assert!(log.len() <= transitions + 1);
            if let Some(first) = values.first() {
                prop_assert!(*first);
            }
            for (frame, expected) in matches.iter().enumerate() {
                prop_assert_eq!(log.query_at(frame as i32), *expected);
            }
        }
    }
}
