//! Error types shared across HandGuide crates.

use std::path::PathBuf;

use handguide_study_model::TaskError;

/// Top-level error type for HandGuide operations.
#[derive(Debug, thiserror::Error)]
pub enum HandguideError {
    #[error("Detection error: {message}")]
    Detection { message: String },

    #[error("Serial error: {message}")]
    Serial { message: String },

    #[error("Calibration error: {message}")]
    Calibration { message: String },

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Corrupt task data: {reason}")]
    CorruptTaskData { reason: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using HandguideError.
pub type HandguideResult<T> = Result<T, HandguideError>;

impl HandguideError {
    pub fn detection(msg: impl Into<String>) -> Self {
        Self::Detection {
            message: msg.into(),
        }
    }

    pub fn serial(msg: impl Into<String>) -> Self {
        Self::Serial {
            message: msg.into(),
        }
    }

    pub fn calibration(msg: impl Into<String>) -> Self {
        Self::Calibration {
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

    pub fn corrupt_task_data(reason: impl Into<String>) -> Self {
        Self::CorruptTaskData {
            reason: reason.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Map an I/O error on `path`, keeping not-found and permission
    /// failures distinguishable.
    pub fn from_io_at(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound { path: path.into() },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                message: format!("{}: {err}", path.into().display()),
            },
            _ => Self::Io(err),
        }
    }
}
