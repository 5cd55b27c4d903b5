//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading, validating, or saving settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A duration is outside its allowed range.
    #[error("{field} must be between {min} and {max} ms (got {value})")]
    OutOfRange {
        /// Name of the offending field
        field: &'static str,
        /// Configured value
        value: i64,
        /// Inclusive lower bound
        min: i64,
        /// Inclusive upper bound
        max: i64,
    },

    /// The settings file could not be read or written.
    #[error("settings file {path:?}: {source}")]
    Io {
        /// Path of the settings file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON for [`Settings`](super::Settings).
    #[error("settings file {path:?} is malformed: {source}")]
    Malformed {
        /// Path of the settings file
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },
}

impl SettingsError {
    /// Returns true if this error came from a value check.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::OutOfRange { .. })
    }
}
