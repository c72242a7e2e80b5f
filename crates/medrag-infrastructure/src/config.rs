//! Client configuration.
//!
//! Loaded from `config.toml` in the medrag config directory. Every field has
//! a default, so a missing file is not an error; `MEDRAG_API_BASE` overrides
//! the backend address.

use crate::paths::MedragPaths;
use medrag_core::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding [`ClientConfig::api_base`].
pub const API_BASE_ENV: &str = "MEDRAG_API_BASE";

const DEFAULT_API_BASE: &str = "http://localhost:8080";
const DEFAULT_ASK_PATH: &str = "/ask";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings for talking to the session backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the REST backend.
    pub api_base: String,
    /// Route of the question endpoint, relative to `api_base`.
    pub ask_path: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            ask_path: DEFAULT_ASK_PATH.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Loads `config.toml` from `paths`, then applies the environment override.
    pub fn load(paths: &MedragPaths) -> Result<Self> {
        let mut config = Self::from_file(&paths.config_file()?)?;
        if let Ok(api_base) = std::env::var(API_BASE_ENV) {
            config = config.with_api_base(api_base);
        }
        Ok(config)
    }

    /// Reads a config file; a missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into();
        if !api_base.trim().is_empty() {
            self.api_base = api_base.trim().to_string();
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ClientConfig::from_file(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "api_base = \"https://rag.example.org\"\n").unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.api_base, "https://rag.example.org");
        assert_eq!(config.ask_path, "/ask");
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let config = ClientConfig::default().with_api_base("  ");
        assert_eq!(config.api_base, "http://localhost:8080");
    }
}
