//! Error types for the model organizer.
//!
//! Per-file errors are folded into failed placement outcomes by the engine;
//! only setup errors escape a run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the organizer.
#[derive(Debug, Error)]
pub enum OrganizerError {
    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("source vanished: {0}")]
    SourceVanished(PathBuf),

    #[error("insufficient space at {path}: need {required} bytes, {available} available")]
    InsufficientSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    #[error("Integrity mismatch: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    // Setup errors
    #[error("Setup failed for {path}: {message}")]
    SetupFailed { path: PathBuf, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Result type alias for organizer operations.
pub type Result<T> = std::result::Result<T, OrganizerError>;

/// Coarse failure classes surfaced in run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Source missing or unreadable
    Source,
    /// Destination filesystem lacks room
    Space,
    /// Copy did not match its source
    Integrity,
    /// Any other filesystem error
    Io,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Source => "source",
            FailureKind::Space => "space",
            FailureKind::Integrity => "integrity",
            FailureKind::Io => "io",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<std::io::Error> for OrganizerError {
    fn from(err: std::io::Error) -> Self {
        OrganizerError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl OrganizerError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        OrganizerError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Map this error onto the failure class reported for a file.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            OrganizerError::SourceVanished(_) | OrganizerError::FileNotFound(_) => {
                FailureKind::Source
            }
            OrganizerError::InsufficientSpace { .. } => FailureKind::Space,
            OrganizerError::IntegrityMismatch { .. } => FailureKind::Integrity,
            _ => FailureKind::Io,
        }
    }

    /// Whether the error prevents the run from starting at all.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OrganizerError::SetupFailed { .. } | OrganizerError::Config { .. }
        )
    }
}
