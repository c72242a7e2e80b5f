//! In-process state repository.
//!
//! Used when nothing should touch the disk (ephemeral REPL runs) and as the
//! fake persistence backend in tests.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::state::model::AppState;
use crate::state::repository::StateRepository;

/// A [`StateRepository`] that keeps the state in memory only.
#[derive(Debug, Default)]
pub struct MemoryStateRepository {
    state: Mutex<AppState>,
}

impl MemoryStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `session_id` already persisted, as after a reload.
    pub fn with_active_session(session_id: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(AppState {
                active_session_id: Some(session_id.into()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StateRepository for MemoryStateRepository {
    async fn save_state(&self, state: AppState) -> Result<()> {
        *self.lock() = state;
        Ok(())
    }

    async fn get_state(&self) -> Result<AppState> {
        Ok(self.lock().clone())
    }

    async fn get_active_session(&self) -> Option<String> {
        self.lock().active_session_id.clone()
    }

    async fn set_active_session(&self, session_id: String) -> Result<()> {
        self.lock().active_session_id = Some(session_id);
        Ok(())
    }

    async fn clear_active_session(&self) -> Result<()> {
        self.lock().active_session_id = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_clear_active_session() {
        let repo = MemoryStateRepository::new();
        assert!(repo.get_active_session().await.is_none());

        repo.set_active_session("s-1".to_string()).await.unwrap();
        assert_eq!(repo.get_active_session().await.as_deref(), Some("s-1"));

        repo.clear_active_session().await.unwrap();
        assert!(repo.get_state().await.unwrap().active_session_id.is_none());
    }

    #[tokio::test]
    async fn test_with_active_session() {
        let repo = MemoryStateRepository::with_active_session("restored");
        assert_eq!(repo.get_active_session().await.as_deref(), Some("restored"));
    }
}
