//! Unified path management for medrag local files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/medrag/            # Config directory (platform config dir)
//! ├── config.toml              # Client configuration
//! ├── state.toml               # Persisted client state (active session)
//! └── logs/                    # Application logs
//!     └── medrag.log.YYYY-MM-DD
//! ```

use std::path::PathBuf;

const APP_DIR: &str = "medrag";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// The platform config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for medrag_core::MedragError {
    fn from(err: PathError) -> Self {
        medrag_core::MedragError::config(err.to_string())
    }
}

/// Resolves every local path the client uses.
///
/// A custom root replaces the platform config directory, which keeps tests
/// and portable installs away from the user's real files.
#[derive(Debug, Clone, Default)]
pub struct MedragPaths {
    root: Option<PathBuf>,
}

impl MedragPaths {
    /// Paths under the platform config directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths under `root` instead of the platform config directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Returns the medrag configuration directory (e.g. `~/.config/medrag/`).
    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(PathError::ConfigDirNotFound),
        }
    }

    pub fn config_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("config.toml"))
    }

    pub fn state_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("state.toml"))
    }

    pub fn log_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("logs"))
    }
}
