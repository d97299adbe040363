// SPDX-License-Identifier: GPL-3.0-only

//! Error types for capture sessions and media ingestion
//!
//! Errors are grouped by the component that raises them:
//!
//! - [`BackendError`]: the platform camera boundary (stream, frame, recorder)
//! - [`CaptureError`]: the capture session state machine
//! - [`IngestError`]: batch and per-file admission outcomes
//! - [`ConfigError`]: configuration loading and validation
//!
//! [`AppError`] wraps all of them for the binary and for callers that do not
//! care which component failed.

use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Main application error type
#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Camera backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Errors raised by a camera backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// No device granted access for the requested constraints
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// Camera device not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    /// The stream was stopped or lost while in use
    #[error("Stream ended")]
    StreamEnded,
    /// A constraint could not be applied to the active track
    #[error("Constraint rejected: {0}")]
    ConstraintRejected(String),
    /// Recorder failed to start or finalize
    #[error("Recorder error: {0}")]
    Recorder(String),
    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

/// Capture session errors
///
/// `DeviceUnavailable` is fatal to the session (it returns to `Closed`) but a
/// retry may succeed. `RecordingFailed` is never fatal: the session stays
/// `Live` with its stream intact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("Recording failed: {0}")]
    RecordingFailed(String),
    #[error("Camera session is not live")]
    NotLive,
    #[error("Recording already in progress")]
    RecordingInProgress,
    #[error("No recording in progress")]
    NotRecording,
    #[error("Still encoding failed: {0}")]
    EncodingFailed(String),
    #[error("Camera session closed while opening")]
    Aborted,
}

/// Admission outcome for a batch or a single file
///
/// Every variant except [`IngestError::ResizeFailed`] blocks admission of the
/// batch or file it names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("Too many files: {requested} requested, maximum allowed is {max}")]
    TooManyFiles { requested: usize, max: usize },
    #[error("Total selected files size {requested} bytes exceeds {max} bytes")]
    BatchTooLarge { requested: u64, max: u64 },
    #[error("File \"{name}\" has an invalid file type ({content_type})")]
    InvalidType { name: String, content_type: String },
    #[error("File \"{name}\" is too large: {size} bytes (max {max})")]
    FileTooLarge { name: String, size: u64, max: u64 },
    #[error("Could not resize \"{name}\", keeping original: {reason}")]
    ResizeFailed { name: String, reason: String },
}

impl IngestError {
    /// Whether this outcome prevents the file or batch from being admitted
    pub fn blocks_admission(&self) -> bool {
        !matches!(self, IngestError::ResizeFailed { .. })
    }

    /// Whether this outcome applies to the whole batch rather than one file
    pub fn is_batch_level(&self) -> bool {
        matches!(
            self,
            IngestError::TooManyFiles { .. } | IngestError::BatchTooLarge { .. }
        )
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(String),
    #[error("Failed to write config: {0}")]
    Write(String),
    #[error("Failed to parse config: {0}")]
    Parse(String),
    #[error("Invalid config value: {0}")]
    Invalid(String),
    #[error("No configuration directory available")]
    NoConfigDir,
}

impl From<BackendError> for CaptureError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Recorder(msg) => CaptureError::RecordingFailed(msg),
            other => CaptureError::DeviceUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_resize_failure_is_non_blocking() {
        let resize = IngestError::ResizeFailed {
            name: "a.jpg".into(),
            reason: "decode".into(),
        };
        assert!(!resize.blocks_admission());

        let too_large = IngestError::FileTooLarge {
            name: "b.mp4".into(),
            size: 10,
            max: 5,
        };
        assert!(too_large.blocks_admission());
        assert!(!too_large.is_batch_level());

        let too_many = IngestError::TooManyFiles {
            requested: 51,
            max: 50,
        };
        assert!(too_many.blocks_admission());
        assert!(too_many.is_batch_level());
    }

    #[test]
    fn test_backend_error_maps_to_capture_error() {
        let err: CaptureError = BackendError::PermissionDenied("user".into()).into();
        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));

        let err: CaptureError = BackendError::Recorder("mux".into()).into();
        assert_eq!(err, CaptureError::RecordingFailed("mux".into()));
    }

    #[test]
    fn test_app_error_wraps_components() {
        fn load() -> AppResult<()> {
            let read: Result<(), ConfigError> = Err(ConfigError::NoConfigDir);
            read?;
            Ok(())
        }
        assert!(matches!(load(), Err(AppError::Config(ConfigError::NoConfigDir))));

        let err: AppError = BackendError::DeviceNotFound("cam".into()).into();
        assert_eq!(err.to_string(), "Camera backend error: Device not found: cam");
    }
}
