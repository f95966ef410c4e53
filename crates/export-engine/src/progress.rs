//! Progress reports and terminal outcomes.

use serde::Serialize;

/// Lifecycle of an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExportState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Export progress report.
///
/// `frames_attempted` counts every frame the job has tried, including
/// skipped ones; a skip-heavy run still advances it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExportProgress {
    pub frames_attempted: u64,

    /// Records appended to the store.
    pub frames_written: u64,

    /// Frames skipped after a decode failure.
    pub frames_skipped: u64,

    /// Written frames that carry a matched pointer position.
    pub frames_matched: u64,

    pub total_frames: u64,

    pub state: ExportState,
}

impl ExportProgress {
    pub(crate) fn start(total_frames: u64) -> Self {
        Self {
            frames_attempted: 0,
            frames_written: 0,
            frames_skipped: 0,
            frames_matched: 0,
            total_frames,
            state: ExportState::Running,
        }
    }

    /// Attempted fraction in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total_frames == 0 {
            return 1.0;
        }
        (self.frames_attempted as f64 / self.total_frames as f64).min(1.0)
    }
}

/// How an export ended. `records` is the number of durable records in
/// the store after finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExportOutcome {
    Completed { records: u64 },
    Failed { records: u64, cause: String },
    Cancelled { records: u64 },
}

impl ExportOutcome {
    pub fn records(&self) -> u64 {
        match self {
            Self::Completed { records }
            | Self::Failed { records, .. }
            | Self::Cancelled { records } => *records,
        }
    }

    pub fn state(&self) -> ExportState {
        match self {
            Self::Completed { .. } => ExportState::Completed,
            Self::Failed { .. } => ExportState::Failed,
            Self::Cancelled { .. } => ExportState::Cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

impl std::fmt::Display for ExportOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed { records } => write!(f, "completed ({records} records)"),
            Self::Failed { records, cause } => {
                write!(f, "failed after {records} records: {cause}")
            }
            Self::Cancelled { records } => write!(f, "cancelled ({records} records)"),
        }
    }
}

/// Item of the progress stream handed to async callers.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportEvent {
    Progress(ExportProgress),
    Finished(ExportOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let failed = ExportOutcome::Failed {
            records: 12,
            cause: "disk full".into(),
        };
        assert_eq!(failed.records(), 12);
        assert_eq!(failed.state(), ExportState::Failed);
        assert!(!failed.is_success());
        assert_eq!(failed.to_string(), "failed after 12 records: disk full");
        assert!(ExportOutcome::Completed { records: 0 }.is_success());
    }

    #[test]
    fn test_outcome_serializes_with_state_tag() {
        let json = serde_json::to_value(ExportOutcome::Cancelled { records: 3 }).unwrap();
        assert_eq!(json["state"], "cancelled");
        assert_eq!(json["records"], 3);
    }

    #[test]
    fn test_fraction_of_empty_job_is_complete() {
        assert_eq!(ExportProgress::start(0).fraction(), 1.0);
        let mut p = ExportProgress::start(4);
        p.frames_attempted = 1;
        assert_eq!(p.fraction(), 0.25);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ExportState::Idle.is_terminal());
        assert!(!ExportState::Running.is_terminal());
        assert!(ExportState::Cancelled.is_terminal());
    }
}
