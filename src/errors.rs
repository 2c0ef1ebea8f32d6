// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the annotator
//!
//! Each layer has its own error enum; [`AppError`] wraps them at the
//! session boundary so callers can tell *why* an operation failed
//! (unreadable stream, bad parameter, wrong state, unknown id, ...).

use std::time::Duration;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    /// Opening, seeking or decoding a video failed
    #[error("Video error: {0}")]
    Video(#[from] VideoError),
    /// A filter stage was configured with invalid parameters
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),
    /// Session operation invalid for the current state or ids
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
    /// Category store or snapshot file could not be read or written
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Video source errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VideoError {
    /// The source cannot be opened at all (missing file, not a video, no decoder)
    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),
    /// The source opened but a seek or decode failed
    #[error("Decode failed: {0}")]
    Decode(String),
    /// A file-handle level failure that may succeed on a second attempt
    #[error("Transient I/O failure: {0}")]
    Transient(String),
}

impl VideoError {
    /// Decode error for a locate that ran past its deadline
    pub fn timed_out(limit: Duration) -> Self {
        VideoError::Decode(format!("decode exceeded {:.1}s limit", limit.as_secs_f64()))
    }

    /// Report any failure to open a source as unsupported
    pub fn into_unsupported(self) -> Self {
        match self {
            VideoError::UnsupportedSource(_) => self,
            other => VideoError::UnsupportedSource(other.to_string()),
        }
    }

    /// Whether retrying the same operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, VideoError::Transient(_))
    }
}

/// Filter configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    /// Parameter outside its declared range (or not a finite number)
    #[error("Invalid parameter {stage}.{name} = {value} (expected {min}..={max})")]
    InvalidParameter {
        stage: &'static str,
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// Edit refers to a stage position that does not exist
    #[error("No filter stage at position {index} (pipeline has {len})")]
    NoSuchStage { index: usize, len: usize },
    /// Parameters for one kind were applied to a stage of another kind
    #[error("Stage {index} is {expected}, got parameters for {found}")]
    KindMismatch {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
}

/// Capture session errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// Operation not valid in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// Unknown record or category id
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    /// Operation would leave a dangling category reference
    #[error("Referential integrity: {0}")]
    ReferentialIntegrity(String),
    /// Name collides with an existing entity
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Malformed user input (empty name, bad color, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SessionError {
    pub fn record_not_found(id: impl ToString) -> Self {
        SessionError::NotFound {
            entity: "Frame record",
            id: id.to_string(),
        }
    }

    pub fn category_not_found(id: impl ToString) -> Self {
        SessionError::NotFound {
            entity: "Category",
            id: id.to_string(),
        }
    }
}

/// Persistence errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
    #[error("Malformed JSON: {0}")]
    Format(String),
    #[error("Image encoding failed: {0}")]
    Encoding(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Format(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_cause() {
        let err = AppError::from(SessionError::record_not_found(7));
        assert_eq!(err.to_string(), "Session error: Frame record not found: 7");

        let err = AppError::from(FilterError::InvalidParameter {
            stage: "brightness_contrast",
            name: "contrast",
            value: -1.0,
            min: 0.0,
            max: 3.0,
        });
        assert!(err.to_string().contains("brightness_contrast.contrast = -1"));
    }

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(VideoError::Transient("EAGAIN".into()).is_transient());
        assert!(!VideoError::Decode("corrupt".into()).is_transient());
        assert!(!VideoError::timed_out(Duration::from_secs(5)).is_transient());
    }

    #[test]
    fn test_open_failures_become_unsupported() {
        let err = VideoError::timed_out(Duration::from_secs(5)).into_unsupported();
        assert_eq!(
            err,
            VideoError::UnsupportedSource("Decode failed: decode exceeded 5.0s limit".into())
        );
        let err = VideoError::Transient("EAGAIN".into()).into_unsupported();
        assert!(matches!(err, VideoError::UnsupportedSource(msg) if msg.contains("EAGAIN")));

        let kept = VideoError::UnsupportedSource("not a video".into());
        assert_eq!(kept.clone().into_unsupported(), kept);
    }
}
