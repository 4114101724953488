//! Error types for devpulse_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for devpulse_core operations.
#[derive(Error, Debug)]
pub enum PulseError {
    /// A version-control command failed, timed out, or the working tree is invalid.
    #[error("repository error ({context}): {message}")]
    Repository {
        /// What was being attempted (command or path).
        context: String,
        /// Underlying failure message.
        message: String,
    },

    /// Diff or log text is not well-formed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The operation is invalid for the session's current state.
    #[error("session {id}: {message}")]
    SessionState {
        /// Session identifier.
        id: String,
        /// Description of the violated transition.
        message: String,
    },

    /// Unknown session or event id.
    #[error("not found: {0}")]
    NotFound(String),

    /// A usage event was rejected before it reached the store.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// The persisted store could not be read.
    #[error("store corrupted at {}: {}", path.display(), reason)]
    StoreCorruption {
        /// Path to the store file.
        path: PathBuf,
        /// Description of the corruption.
        reason: String,
    },

    /// Embedded database failure other than corruption.
    #[error("store error: {0}")]
    Store(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization of a stored record failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    Config(String),
}

impl PulseError {
    pub(crate) fn repository(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Repository {
            context: context.into(),
            message: message.into(),
        }
    }

    pub(crate) fn session_state(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SessionState {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors that `track_change` downgrades to a degraded record.
    pub fn is_per_file(&self) -> bool {
        matches!(self, Self::Repository { .. } | Self::Parse(_))
    }

    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Repository { .. } => {
                Some("Check that the working directory is a git repository and that git is on PATH.")
            }
            Self::SessionState { .. } => {
                Some("List sessions with 'devpulse session list' to see their current state.")
            }
            Self::NotFound(_) => Some("Start a session with 'devpulse session start' first."),
            Self::StoreCorruption { .. } => {
                Some("The corrupt file was kept as a .bak copy; run 'devpulse store rebuild' after restoring it.")
            }
            Self::Config(_) => Some("Fix or delete config.toml in the data directory."),
            Self::InvalidEvent(_) => Some("Event metrics must be finite numbers and event ids must be unique."),
            _ => None,
        }
    }
}

/// Convenience Result type for devpulse_core operations.
pub type Result<T> = std::result::Result<T, PulseError>;
