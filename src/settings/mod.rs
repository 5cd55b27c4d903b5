//! Timer settings.
//!
//! Interval lengths and the resume timeout are stored in a JSON file in the
//! data directory. Missing fields and a missing file fall back to defaults.
//!
//! # Example
//!
//! ```
//! use pomotick::settings::{Settings, SettingsSource};
//!
//! let settings = Settings::default();
//! assert_eq!(settings.focus_length_millis(), 25 * 60 * 1000);
//! assert!(settings.validate().is_ok());
//! ```

mod error;

use std::path::Path;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

pub use error::SettingsError;

const MINUTE_MILLIS: i64 = 60 * 1000;

/// Shortest allowed focus or break length.
pub const MIN_LENGTH_MILLIS: i64 = 1000;

/// Longest allowed focus or break length.
pub const MAX_LENGTH_MILLIS: i64 = 24 * 60 * MINUTE_MILLIS;

/// Longest allowed resume timeout.
pub const MAX_RESUME_TIMEOUT_MILLIS: i64 = 7 * 24 * 60 * MINUTE_MILLIS;

fn default_focus_length_millis() -> i64 {
    25 * MINUTE_MILLIS
}

fn default_break_length_millis() -> i64 {
    5 * MINUTE_MILLIS
}

fn default_resume_timeout_millis() -> i64 {
    10 * MINUTE_MILLIS
}

// ============================================================================
// SettingsSource
// ============================================================================

/// Read-only view of the settings the timer engine consults.
///
/// The engine reads these when a phase starts and at startup reconciliation,
/// never caching them beyond the computed phase length.
pub trait SettingsSource: Send + Sync {
    /// Length of a focus interval.
    fn focus_length_millis(&self) -> i64;

    /// Length of a break.
    fn break_length_millis(&self) -> i64;

    /// Maximum downtime after which an in-progress timer is reset on startup.
    fn resume_timeout_millis(&self) -> i64;
}

// ============================================================================
// Settings
// ============================================================================

/// User settings for the timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Focus interval length in millis
    #[serde(default = "default_focus_length_millis")]
    pub focus_length_millis: i64,

    /// Break length in millis
    #[serde(default = "default_break_length_millis")]
    pub break_length_millis: i64,

    /// Downtime tolerated before a running timer is reset on startup
    #[serde(default = "default_resume_timeout_millis")]
    pub resume_timeout_millis: i64,

    /// Show elapsed instead of remaining time. Display only.
    #[serde(default)]
    pub show_elapsed_time: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            focus_length_millis: default_focus_length_millis(),
            break_length_millis: default_break_length_millis(),
            resume_timeout_millis: default_resume_timeout_millis(),
            show_elapsed_time: false,
        }
    }
}

impl Settings {
    /// Sets the focus length in minutes.
    #[must_use]
    pub fn with_focus_minutes(mut self, minutes: i64) -> Self {
        self.focus_length_millis = minutes * MINUTE_MILLIS;
        self
    }

    /// Sets the break length in minutes.
    #[must_use]
    pub fn with_break_minutes(mut self, minutes: i64) -> Self {
        self.break_length_millis = minutes * MINUTE_MILLIS;
        self
    }

    /// Sets the resume timeout in minutes.
    #[must_use]
    pub fn with_resume_timeout_minutes(mut self, minutes: i64) -> Self {
        self.resume_timeout_millis = minutes * MINUTE_MILLIS;
        self
    }

    /// Validates the configured durations.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::OutOfRange`] for the first field outside its
    /// allowed range.
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range(
            "focus_length_millis",
            self.focus_length_millis,
            MIN_LENGTH_MILLIS,
            MAX_LENGTH_MILLIS,
        )?;
        check_range(
            "break_length_millis",
            self.break_length_millis,
            MIN_LENGTH_MILLIS,
            MAX_LENGTH_MILLIS,
        )?;
        check_range(
            "resume_timeout_millis",
            self.resume_timeout_millis,
            0,
            MAX_RESUME_TIMEOUT_MILLIS,
        )
    }

    /// Loads and validates settings from `path`.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or holds
    /// out-of-range values.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let settings: Settings =
            serde_json::from_slice(&raw).map_err(|source| SettingsError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Writes settings to `path` as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_vec_pretty(self).map_err(|source| SettingsError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)
    }
}

fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), SettingsError> {
    if value < min || value > max {
        return Err(SettingsError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

impl SettingsSource for Settings {
    fn focus_length_millis(&self) -> i64 {
        self.focus_length_millis
    }

    fn break_length_millis(&self) -> i64 {
        self.break_length_millis
    }

    fn resume_timeout_millis(&self) -> i64 {
        self.resume_timeout_millis
    }
}

/// Settings that can be replaced while the engine is running.
impl SettingsSource for RwLock<Settings> {
    fn focus_length_millis(&self) -> i64 {
        self.read()
            .unwrap_or_else(PoisonError::into_inner)
            .focus_length_millis
    }

    fn break_length_millis(&self) -> i64 {
        self.read()
            .unwrap_or_else(PoisonError::into_inner)
            .break_length_millis
    }

    fn resume_timeout_millis(&self) -> i64 {
        self.read()
            .unwrap_or_else(PoisonError::into_inner)
            .resume_timeout_millis
    }
}
