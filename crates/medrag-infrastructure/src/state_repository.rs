//! File-backed state repository.
//!
//! Persists [`AppState`] (currently just the active session id) to
//! `state.toml` so a restart restores the same active session.

use crate::paths::MedragPaths;
use crate::storage::AtomicTomlFile;
use async_trait::async_trait;
use medrag_core::error::{MedragError, Result};
use medrag_core::state::{AppState, StateRepository};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// [`StateRepository`] backed by an atomic TOML file.
///
/// The state is cached in memory after the initial load; writes update the
/// cache first and then the file on the blocking pool.
#[derive(Clone)]
pub struct FileStateRepository {
    /// Cached app state loaded from storage.
    state: Arc<Mutex<AppState>>,
    path: PathBuf,
}

impl FileStateRepository {
    /// Opens the state file from the platform config directory.
    pub async fn new() -> Result<Self> {
        Self::with_paths(&MedragPaths::new()).await
    }

    /// Opens the state file resolved by `paths`.
    pub async fn with_paths(paths: &MedragPaths) -> Result<Self> {
        Self::open(paths.state_file()?).await
    }

    /// Opens (without creating) the state file at `path`.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let load_path = path.clone();
        let initial_state = tokio::task::spawn_blocking(move || {
            AtomicTomlFile::<AppState>::new(load_path).load()
        })
        .await
        .map_err(|e| MedragError::internal(format!("Failed to join task: {}", e)))?
        .unwrap_or_else(|err| {
            tracing::warn!(path = %path.display(), error = %err, "unreadable state file, starting empty");
            None
        })
        .unwrap_or_default();

        tracing::debug!(
            active_session_id = ?initial_state.active_session_id,
            "loaded client state"
        );

        Ok(Self {
            state: Arc::new(Mutex::new(initial_state)),
            path,
        })
    }

    async fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut AppState),
    {
        let next = {
            let mut state = self.state.lock().await;
            f(&mut state);
            state.clone()
        };
        self.save_state(next).await
    }
}

#[async_trait]
impl StateRepository for FileStateRepository {
    async fn save_state(&self, state: AppState) -> Result<()> {
        {
            let mut cached = self.state.lock().await;
            *cached = state.clone();
        }

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || AtomicTomlFile::new(path).save(&state))
            .await
            .map_err(|e| MedragError::internal(format!("Failed to join task: {}", e)))??;

        Ok(())
    }

    async fn get_state(&self) -> Result<AppState> {
        Ok(self.state.lock().await.clone())
    }

    async fn get_active_session(&self) -> Option<String> {
        self.state.lock().await.active_session_id.clone()
    }

    async fn set_active_session(&self, session_id: String) -> Result<()> {
        self.update(|state| state.active_session_id = Some(session_id)).await
    }

    async fn clear_active_session(&self) -> Result<()> {
        self.update(|state| state.active_session_id = None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_default_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let repo = FileStateRepository::with_paths(&MedragPaths::with_root(temp_dir.path()))
            .await
            .unwrap();
        assert!(repo.get_active_session().await.is_none());
    }

    #[tokio::test]
    async fn test_active_session_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let paths = MedragPaths::with_root(temp_dir.path());

        let repo = FileStateRepository::with_paths(&paths).await.unwrap();
        repo.set_active_session("s-123".to_string()).await.unwrap();

        let reopened = FileStateRepository::with_paths(&paths).await.unwrap();
        assert_eq!(reopened.get_active_session().await.as_deref(), Some("s-123"));
    }

    #[tokio::test]
    async fn test_clear_active_session_persists() {
        let temp_dir = TempDir::new().unwrap();
        let paths = MedragPaths::with_root(temp_dir.path());

        let repo = FileStateRepository::with_paths(&paths).await.unwrap();
        repo.set_active_session("s-456".to_string()).await.unwrap();
        repo.clear_active_session().await.unwrap();

        let reopened = FileStateRepository::with_paths(&paths).await.unwrap();
        assert!(reopened.get_active_session().await.is_none());
        let on_disk = std::fs::read_to_string(paths.state_file().unwrap()).unwrap();
        assert!(!on_disk.contains("activeSessionId"));
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        let paths = MedragPaths::with_root(temp_dir.path());
        std::fs::write(paths.state_file().unwrap(), "not = [valid").unwrap();

        let repo = FileStateRepository::with_paths(&paths).await.unwrap();
        assert!(repo.get_active_session().await.is_none());
    }
}
