//! Active-session selection.

use medrag_core::error::Result;
use medrag_core::session::SessionSummary;
use medrag_core::state::StateRepository;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Tracks which session the client is showing.
///
/// The id is persisted through the injected [`StateRepository`] so it
/// survives a restart; the in-memory copy is authoritative while running.
pub struct ActiveSessionSelector {
    state_repository: Arc<dyn StateRepository>,
    current: RwLock<Option<String>>,
    /// Set once `auto_select` has picked a session during this mount
    auto_selected: AtomicBool,
}

impl ActiveSessionSelector {
    pub fn new(state_repository: Arc<dyn StateRepository>) -> Self {
        Self {
            state_repository,
            current: RwLock::new(None),
            auto_selected: AtomicBool::new(false),
        }
    }

    /// Loads the persisted id. Call once at startup.
    pub async fn restore(&self) -> Option<String> {
        let restored = self.state_repository.get_active_session().await;
        tracing::info!("[Selector] restored active session: {:?}", restored);
        *self.current.write().await = restored.clone();
        restored
    }

    /// Returns the currently selected id.
    pub async fn current(&self) -> Option<String> {
        self.current.read().await.clone()
    }

    /// Selects `session_id`. Nothing is written when it is already current.
    pub async fn select(&self, session_id: &str) -> Result<()> {
        let mut current = self.current.write().await;
        if current.as_deref() == Some(session_id) {
            return Ok(());
        }
        self.state_repository
            .set_active_session(session_id.to_string())
            .await?;
        tracing::debug!("[Selector] selected {}", session_id);
        *current = Some(session_id.to_string());
        Ok(())
    }

    /// Clears the selection.
    pub async fn clear(&self) -> Result<()> {
        let mut current = self.current.write().await;
        self.state_repository.clear_active_session().await?;
        tracing::debug!("[Selector] cleared (was {:?})", current);
        *current = None;
        Ok(())
    }

    /// Clears the selection only if `session_id` is selected.
    ///
    /// Returns whether anything was cleared.
    pub async fn clear_if(&self, session_id: &str) -> Result<bool> {
        let mut current = self.current.write().await;
        if current.as_deref() != Some(session_id) {
            return Ok(false);
        }
        self.state_repository.clear_active_session().await?;
        tracing::debug!("[Selector] cleared {}", session_id);
        *current = None;
        Ok(true)
    }

    /// Moves the selection from `from` to `to` if `from` is selected.
    pub async fn repoint(&self, from: &str, to: &str) -> Result<bool> {
        let mut current = self.current.write().await;
        if current.as_deref() != Some(from) {
            return Ok(false);
        }
        self.state_repository.set_active_session(to.to_string()).await?;
        tracing::debug!("[Selector] repointed {} -> {}", from, to);
        *current = Some(to.to_string());
        Ok(true)
    }

    /// Selects the first summary when nothing is selected.
    ///
    /// Fires at most once until [`ActiveSessionSelector::remount`].
    pub async fn auto_select(&self, summaries: &[SessionSummary]) -> Result<Option<String>> {
        if self.auto_selected.load(Ordering::SeqCst) || self.current().await.is_some() {
            return Ok(None);
        }
        let Some(first) = summaries.first() else {
            return Ok(None);
        };
        if self.auto_selected.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        self.select(&first.id).await?;
        tracing::info!("[Selector] auto-selected {}", first.id);
        Ok(Some(first.id.clone()))
    }

    /// Re-arms `auto_select`.
    pub fn remount(&self) {
        self.auto_selected.store(false, Ordering::SeqCst);
    }
}
