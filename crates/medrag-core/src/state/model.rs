//! Application state domain models.
//!
//! Contains client state that persists across restarts.

use serde::{Deserialize, Serialize};

/// Client state that survives a reload.
///
/// # File Location
///
/// - Linux: `~/.config/medrag/state.toml`
/// - macOS: `~/Library/Application Support/medrag/state.toml`
/// - Windows: `%APPDATA%\medrag\state.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    /// ID of the currently active session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_session_id: Option<String>,
}

impl AppState {
    /// Creates a new AppState with default values.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let state = AppState::new();
        assert!(state.active_session_id.is_none());
    }

    #[test]
    fn test_active_session_key_name() {
        let state = AppState {
            active_session_id: Some("s-1".to_string()),
        };
        let encoded = toml::to_string(&state).unwrap();
        assert_eq!(encoded.trim(), "activeSessionId = \"s-1\"");
    }

    #[test]
    fn test_cleared_state_omits_key() {
        let encoded = toml::to_string(&AppState::default()).unwrap();
        assert!(encoded.trim().is_empty());
    }
}
