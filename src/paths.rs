//! Locations of the files the daemon and CLI share.
//!
//! Everything lives under one data directory, `~/.pomotick` unless
//! overridden with `--home` or `POMOTICK_HOME`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Data directory name under the user's home directory.
pub const DATA_DIR_NAME: &str = ".pomotick";

const SOCKET_FILE: &str = "pomotick.sock";
const STATE_FILE: &str = "timer.json";
const SETTINGS_FILE: &str = "settings.json";

/// Paths derived from the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    /// Uses `root` as the data directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves the data directory: `override_root` if given, else
    /// `~/.pomotick`.
    ///
    /// # Errors
    ///
    /// Returns an error if no override is given and the home directory
    /// cannot be determined.
    pub fn resolve(override_root: Option<&Path>) -> Result<Self> {
        if let Some(root) = override_root {
            return Ok(Self::new(root));
        }
        let home = dirs::home_dir().context("could not determine the home directory")?;
        Ok(Self::new(home.join(DATA_DIR_NAME)))
    }

    /// Data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Unix socket the daemon listens on.
    pub fn socket(&self) -> PathBuf {
        self.root.join(SOCKET_FILE)
    }

    /// Persisted timer record.
    pub fn state_file(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    /// User settings.
    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }
}
