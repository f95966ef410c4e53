//! Session metadata and on-disk bundle.
//!
//! A session directory ties one video recording to one pointer event
//! stream, together with the calibration anchor and the reviewed labels:
//!
//! ```text
//! session/
//!   session.json      metadata, calibration, labels
//!   video.mp4         referenced by `video`
//!   pointer.jsonl     referenced by `pointer_events`
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use touchset_common::error::TouchsetError;

use crate::calibration::CalibrationOffset;
use crate::event::parse_pointer_events;
use crate::pointer_log::PointerEventLog;
use crate::state_log::StateChangeLog;

pub const SESSION_FILE: &str = "session.json";

/// Top-level session file (`session.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Schema version.
    pub version: String,

    /// Human-readable session name.
    pub name: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Last modified timestamp (ISO 8601).
    pub modified_at: String,

    /// Video file or frame directory, relative to the session root.
    pub video: String,

    /// Pointer event JSONL, relative to the session root.
    pub pointer_events: String,

    /// Frame rate to use instead of the probed one (frame directories need this).
    #[serde(default)]
    pub fps_override: Option<f64>,

    /// Anchor pair set by `mark`.
    #[serde(default)]
    pub calibration: Option<CalibrationOffset>,

    /// Reviewed touch labels.
    #[serde(default)]
    pub labels: StateChangeLog,
}

/// A session loaded from disk with its pointer log.
#[derive(Debug, Clone)]
pub struct LoadedSession {
    /// Filesystem path to the session directory.
    pub root: PathBuf,

    /// Session metadata.
    pub session: Session,

    /// Sorted pointer events.
    pub pointer_log: PointerEventLog,
}

impl Session {
    pub fn new(
        name: impl Into<String>,
        video: impl Into<String>,
        pointer_events: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            version: "1.0".to_string(),
            name: name.into(),
            created_at: now.clone(),
            modified_at: now,
            video: video.into(),
            pointer_events: pointer_events.into(),
            fps_override: None,
            calibration: None,
            labels: StateChangeLog::new(),
        }
    }
}

impl LoadedSession {
    /// Load a session from a directory.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, SessionError> {
        let root = root.as_ref().to_path_buf();
        let session_path = root.join(SESSION_FILE);

        let session_json =
            std::fs::read_to_string(&session_path).map_err(|e| SessionError::IoError {
                path: session_path.clone(),
                source: e,
            })?;
        let session: Session =
            serde_json::from_str(&session_json).map_err(|e| SessionError::ParseError {
                path: session_path,
                source: e,
            })?;

        let events_path = root.join(&session.pointer_events);
        let events_jsonl =
            std::fs::read_to_string(&events_path).map_err(|e| SessionError::IoError {
                path: events_path.clone(),
                source: e,
            })?;
        let events = parse_pointer_events(&events_jsonl).map_err(|e| SessionError::ParseError {
            path: events_path,
            source: e,
        })?;
        let pointer_log = PointerEventLog::from_events(events);

        tracing::debug!(
            session = %session.name,
            events = pointer_log.len(),
            calibrated = session.calibration.is_some(),
            "Session loaded"
        );

        Ok(Self {
            root,
            session,
            pointer_log,
        })
    }

    /// Create a session on disk. Referenced files are not copied.
    pub fn create(root: impl AsRef<Path>, session: Session) -> Result<Self, SessionError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| SessionError::IoError {
            path: root.clone(),
            source: e,
        })?;

        let mut loaded = Self {
            root,
            session,
            pointer_log: PointerEventLog::default(),
        };
        loaded.save()?;

        // The event file may be recorded later; keep the empty log until then.
        if loaded.pointer_events_path().exists() {
            return Self::load(&loaded.root);
        }
        Ok(loaded)
    }

    /// Write `session.json`, refreshing `modified_at`.
    pub fn save(&mut self) -> Result<(), SessionError> {
        self.session.modified_at = chrono::Utc::now().to_rfc3339();
        let session_path = self.root.join(SESSION_FILE);
        let json = serde_json::to_string_pretty(&self.session).map_err(|e| {
            SessionError::ParseError {
                path: session_path.clone(),
                source: e,
            }
        })?;
        std::fs::write(&session_path, json).map_err(|e| SessionError::IoError {
            path: session_path,
            source: e,
        })
    }

    pub fn video_path(&self) -> PathBuf {
        self.root.join(&self.session.video)
    }

    pub fn pointer_events_path(&self) -> PathBuf {
        self.root.join(&self.session.pointer_events)
    }

    /// Replace the calibration anchor, returning the previous one.
    pub fn mark(&mut self, calibration: CalibrationOffset) -> Option<CalibrationOffset> {
        let previous = self.session.calibration.replace(calibration);
        if let Some(prev) = previous {
            tracing::info!(
                previous_frame = prev.anchor_frame,
                previous_timestamp_us = prev.anchor_timestamp_us,
                "Replacing calibration anchor"
            );
        }
        previous
    }

    /// Check that all referenced files exist.
    pub fn validate_sources(&self) -> Vec<String> {
        let mut errors = vec![];

        if !self.video_path().exists() {
            errors.push(format!("Video source missing: {}", self.session.video));
        }
        if !self.pointer_events_path().exists() {
            errors.push(format!(
                "Pointer events missing: {}",
                self.session.pointer_events
            ));
        }
        if self.session.calibration.is_none() {
            errors.push("Calibration anchor not set (run `touchset mark`)".to_string());
        }

        errors
    }
}

/// Errors that can occur when working with sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<SessionError> for TouchsetError {
    fn from(err: SessionError) -> Self {
        TouchsetError::session(err.to_string())
    }
}
