//! Error types shared across Touchset crates.

use std::path::PathBuf;

/// Top-level error type for Touchset operations.
#[derive(Debug, thiserror::Error)]
pub enum TouchsetError {
    /// A single frame could not be decoded. Recoverable: the export skips it.
    #[error("Failed to decode frame {frame}: {message}")]
    Decode { frame: i32, message: String },

    #[error("End of stream at frame {frame}")]
    EndOfStream { frame: i32 },

    /// An appended record does not match the store's fixed tensor shape.
    #[error("Schema mismatch: store expects {expected} values per image, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("Dataset error: {message}")]
    Dataset { message: String },

    #[error("Calibration missing: mark a frame against a pointer timestamp before exporting")]
    CalibrationMissing,

    #[error("Empty frame range [{start}, {end})")]
    EmptyRange { start: i32, end: i32 },

    #[error("Video error: {message}")]
    Video { message: String },

    #[error("Processing error: {message}")]
    Processing { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using TouchsetError.
pub type TouchsetResult<T> = Result<T, TouchsetError>;

impl TouchsetError {
    pub fn decode(frame: i32, msg: impl Into<String>) -> Self {
        Self::Decode {
            frame,
            message: msg.into(),
        }
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset {
            message: msg.into(),
        }
    }

    pub fn video(msg: impl Into<String>) -> Self {
        Self::Video {
            message: msg.into(),
        }
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing {
            message: msg.into(),
        }
    }

    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether the export loop may skip past this error and keep going.
    ///
    /// Only per-frame decode failures qualify; writer and schema errors
    /// always end the job.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_decode_errors_are_recoverable() {
        assert!(TouchsetError::decode(50, "corrupt packet").is_recoverable());
        assert!(!TouchsetError::EndOfStream { frame: 3 }.is_recoverable());
        assert!(!TouchsetError::SchemaMismatch {
            expected: 12,
            actual: 27
        }
        .is_recoverable());
        assert!(!TouchsetError::dataset("disk full").is_recoverable());
        assert!(!TouchsetError::CalibrationMissing.is_recoverable());
    }

    #[test]
    fn test_error_messages_name_the_frame() {
        let err = TouchsetError::decode(7, "bad header");
        assert_eq!(err.to_string(), "Failed to decode frame 7: bad header");
    }
}
