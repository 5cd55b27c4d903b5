//! Durable storage for the timer record.
//!
//! The record is written as JSON. Saves go to a temporary sibling first and
//! are renamed into place, so a crash mid-write leaves the previous copy.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::TimerState;

/// Errors raised by [`StateStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The state file could not be read or written.
    #[error("state file {path:?}: {source}")]
    Io {
        /// Path of the state file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The state file exists but does not hold a timer record.
    #[error("state file {path:?} is corrupt: {source}")]
    Corrupt {
        /// Path of the state file
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },
}

/// Loads and saves [`TimerState`] at a fixed path.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Creates a store for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the state file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the saved record, or a default record if none was saved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the file cannot be parsed and
    /// [`StoreError::Io`] if it cannot be read.
    pub fn load(&self) -> Result<TimerState, StoreError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(TimerState::default());
            }
            Err(source) => return Err(self.io_error(source)),
        };

        serde_json::from_slice(&raw).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Saves `state`, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be written.
    pub fn save(&self, state: &TimerState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_vec_pretty(state).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        tracing::trace!(path = %self.path.display(), "timer state saved");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
