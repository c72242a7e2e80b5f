//! Local session cache.
//!
//! `LocalStore` keeps the summary list and the cached session details the
//! client renders from. All state sits behind a single lock so a mutation is
//! visible to every reader as soon as the call returns.

use medrag_core::error::{MedragError, Result};
use medrag_core::session::{Message, Session, SessionSummary, UNTITLED_SESSION_TITLE};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{RwLock, watch};

#[derive(Debug, Default)]
struct StoreState {
    /// Session rows, most recently touched first
    summaries: Vec<SessionSummary>,
    /// Cached session details by id
    details: HashMap<String, Session>,
    /// Ids deleted during this store's lifetime
    tombstones: HashSet<String>,
}

impl StoreState {
    fn ensure_live(&self, session_id: &str) -> Result<()> {
        if self.tombstones.contains(session_id) {
            return Err(MedragError::session_not_found(session_id));
        }
        Ok(())
    }
}

/// Key-addressed cache of session summaries and details.
///
/// Readers always receive clones. Writes to an id removed with
/// [`LocalStore::remove`] are refused with `NotFound`.
#[derive(Clone)]
pub struct LocalStore {
    state: Arc<RwLock<StoreState>>,
    revision: Arc<watch::Sender<u64>>,
}

impl LocalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            revision: Arc::new(revision),
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Subscribes to change notifications. The value is a revision counter
    /// incremented after every successful mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Inserts or replaces a summary row and moves it to the front.
    pub async fn upsert_summary(&self, row: SessionSummary) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.ensure_live(&row.id)?;
            state.summaries.retain(|s| s.id != row.id);
            tracing::debug!("[LocalStore] upsert_summary: id={}", row.id);
            state.summaries.insert(0, row);
        }
        self.bump();
        Ok(())
    }

    /// Replaces the summary list wholesale.
    ///
    /// Duplicate ids keep their first row; tombstoned ids are dropped.
    pub async fn replace_summaries(&self, rows: Vec<SessionSummary>) {
        {
            let mut state = self.state.write().await;
            let mut seen = HashSet::new();
            let rows: Vec<SessionSummary> = rows
                .into_iter()
                .filter(|row| !state.tombstones.contains(&row.id))
                .filter(|row| seen.insert(row.id.clone()))
                .collect();
            tracing::debug!("[LocalStore] replace_summaries: {} rows", rows.len());
            state.summaries = rows;
        }
        self.bump();
    }

    /// Applies `f` to the summary row for `session_id` without moving it.
    ///
    /// Returns `Ok(false)` when no row exists.
    pub async fn update_summary<F>(&self, session_id: &str, f: F) -> Result<bool>
    where
        F: FnOnce(&mut SessionSummary),
    {
        let updated = {
            let mut state = self.state.write().await;
            state.ensure_live(session_id)?;
            match state.summaries.iter_mut().find(|s| s.id == session_id) {
                Some(row) => {
                    f(row);
                    true
                }
                None => false,
            }
        };
        if updated {
            self.bump();
        }
        Ok(updated)
    }

    /// Replaces the cached detail for `session.id`.
    pub async fn upsert_detail(&self, session: Session) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.ensure_live(&session.id)?;
            tracing::debug!(
                "[LocalStore] upsert_detail: id={}, messages={}",
                session.id,
                session.messages.len()
            );
            state.details.insert(session.id.clone(), session);
        }
        self.bump();
        Ok(())
    }

    /// Merges messages into a cached detail by id.
    ///
    /// Existing ids are replaced in place, new ids are appended in order.
    /// Title, timestamps and pane are left untouched.
    pub async fn append_messages(&self, session_id: &str, messages: Vec<Message>) -> Result<()> {
        self.update_detail(session_id, |session| {
            for message in messages {
                session.upsert_message(message);
            }
        })
        .await
    }

    /// Updates a cached detail in place and returns the closure's result.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id is tombstoned or no detail is cached.
    pub async fn update_detail<F, R>(&self, session_id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut Session) -> R,
    {
        let result = {
            let mut state = self.state.write().await;
            state.ensure_live(session_id)?;
            let session = state
                .details
                .get_mut(session_id)
                .ok_or_else(|| MedragError::session_not_found(session_id))?;
            let result = f(session);
            tracing::debug!(
                "[LocalStore] update_detail: id={}, messages={}",
                session_id,
                session.messages.len()
            );
            result
        };
        self.bump();
        Ok(result)
    }

    /// Like [`LocalStore::update_detail`], but caches `init()` first when no
    /// detail exists. The flag reports whether the entry was created.
    pub async fn update_or_insert_detail<I, F, R>(&self, session_id: &str, init: I, f: F) -> Result<(R, bool)>
    where
        I: FnOnce() -> Session,
        F: FnOnce(&mut Session) -> R,
    {
        let (result, created) = {
            let mut state = self.state.write().await;
            state.ensure_live(session_id)?;
            let created = !state.details.contains_key(session_id);
            let session = state
                .details
                .entry(session_id.to_string())
                .or_insert_with(init);
            (f(session), created)
        };
        if created {
            tracing::debug!("[LocalStore] created provisional detail: id={}", session_id);
        }
        self.bump();
        Ok((result, created))
    }

    /// Drops a cached detail without tombstoning the id.
    ///
    /// Used for provisional entries the server never knew about.
    pub async fn discard_detail(&self, session_id: &str) -> Option<Session> {
        let removed = self.state.write().await.details.remove(session_id);
        if removed.is_some() {
            tracing::debug!("[LocalStore] discard_detail: id={}", session_id);
            self.bump();
        }
        removed
    }

    /// Removes the summary row and detail entry and tombstones the id.
    pub async fn remove(&self, session_id: &str) {
        {
            let mut state = self.state.write().await;
            state.summaries.retain(|s| s.id != session_id);
            state.details.remove(session_id);
            state.tombstones.insert(session_id.to_string());
        }
        tracing::debug!("[LocalStore] remove: id={}", session_id);
        self.bump();
    }

    /// Whether `session_id` was removed from this store.
    pub async fn is_deleted(&self, session_id: &str) -> bool {
        self.state.read().await.tombstones.contains(session_id)
    }

    /// Snapshot of the summary list.
    pub async fn summaries(&self) -> Vec<SessionSummary> {
        self.state.read().await.summaries.clone()
    }

    pub async fn summary(&self, session_id: &str) -> Option<SessionSummary> {
        let state = self.state.read().await;
        state.summaries.iter().find(|s| s.id == session_id).cloned()
    }

    /// Snapshot of a cached detail.
    pub async fn detail(&self, session_id: &str) -> Option<Session> {
        self.state.read().await.details.get(session_id).cloned()
    }

    /// Case-insensitive title filter over the summary list.
    ///
    /// Rows without a title match as "untitled". A blank query returns every row.
    pub async fn search(&self, query: &str) -> Vec<SessionSummary> {
        let needle = query.trim().to_lowercase();
        let state = self.state.read().await;
        if needle.is_empty() {
            return state.summaries.clone();
        }
        state
            .summaries
            .iter()
            .filter(|row| {
                let title = if row.title.trim().is_empty() {
                    UNTITLED_SESSION_TITLE
                } else {
                    row.title.as_str()
                };
                title.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medrag_core::session::MessageRole;

    fn row(id: &str, title: &str, updated_at: i64) -> SessionSummary {
        SessionSummary {
            id: id.to_string(),
            title: title.to_string(),
            updated_at,
        }
    }

    fn assistant(id: &str, content: &str) -> Message {
        Message {
            id: id.to_string(),
            role: MessageRole::Assistant,
            content: content.to_string(),
            ts: Some(1),
            references: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_upsert_summary_moves_row_to_front() {
        let store = LocalStore::new();
        store.upsert_summary(row("a", "A", 1)).await.unwrap();
        store.upsert_summary(row("b", "B", 2)).await.unwrap();
        store.upsert_summary(row("a", "A2", 3)).await.unwrap();

        let summaries = store.summaries().await;
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0], row("a", "A2", 3));
        assert_eq!(summaries[1].id, "b");
    }

    #[tokio::test]
    async fn test_replace_summaries_deduplicates_first_wins() {
        let store = LocalStore::new();
        store
            .replace_summaries(vec![row("a", "first", 2), row("b", "B", 1), row("a", "second", 0)])
            .await;

        let summaries = store.summaries().await;
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].title, "first");
    }

    #[tokio::test]
    async fn test_append_messages_merges_by_id() {
        let store = LocalStore::new();
        let mut session = Session::new("s1", "Title", 10);
        session.messages.push(Message::user("u1", "hi", 1));
        store.upsert_detail(session).await.unwrap();

        store
            .append_messages("s1", vec![assistant("a1", "draft"), assistant("a1", "final")])
            .await
            .unwrap();

        let detail = store.detail("s1").await.unwrap();
        assert_eq!(detail.messages.len(), 2);
        assert_eq!(detail.messages[1].content, "final");
        assert_eq!(detail.title, "Title");
        assert_eq!(detail.updated_at, 10);
    }

    #[tokio::test]
    async fn test_update_detail_missing_is_not_found() {
        let store = LocalStore::new();
        let err = store.update_detail("nope", |_| ()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_remove_tombstones_and_refuses_writes() {
        let store = LocalStore::new();
        store.upsert_summary(row("s1", "A", 1)).await.unwrap();
        store.upsert_detail(Session::new("s1", "A", 1)).await.unwrap();

        store.remove("s1").await;

        assert!(store.summaries().await.is_empty());
        assert!(store.detail("s1").await.is_none());
        assert!(store.is_deleted("s1").await);
        assert!(store.upsert_detail(Session::new("s1", "A", 2)).await.unwrap_err().is_not_found());
        assert!(store.upsert_summary(row("s1", "A", 2)).await.unwrap_err().is_not_found());

        store.replace_summaries(vec![row("s1", "A", 3), row("s2", "B", 1)]).await;
        let ids: Vec<_> = store.summaries().await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["s2"]);
    }

    #[tokio::test]
    async fn test_update_or_insert_detail_reports_creation() {
        let store = LocalStore::new();

        let (len, created) = store
            .update_or_insert_detail("s1", || Session::new("s1", "New", 1), |s| {
                s.messages.push(Message::user("u1", "hi", 1));
                s.messages.len()
            })
            .await
            .unwrap();
        assert_eq!((len, created), (1, true));

        let (len, created) = store
            .update_or_insert_detail("s1", || Session::new("s1", "Other", 2), |s| s.messages.len())
            .await
            .unwrap();
        assert_eq!((len, created), (1, false));
        assert_eq!(store.detail("s1").await.unwrap().title, "New");
    }

    #[tokio::test]
    async fn test_discard_detail_does_not_tombstone() {
        let store = LocalStore::new();
        store.upsert_detail(Session::new("tmp", "A", 1)).await.unwrap();

        assert!(store.discard_detail("tmp").await.is_some());
        assert!(!store.is_deleted("tmp").await);
        assert!(store.discard_detail("tmp").await.is_none());
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_matches_untitled() {
        let store = LocalStore::new();
        store
            .replace_summaries(vec![row("a", "Asthma in Children", 3), row("b", "", 2), row("c", "Diabetes", 1)])
            .await;

        let hits = store.search("ASTHMA").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");

        let hits = store.search("untitled").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");

        assert_eq!(store.search("  ").await.len(), 3);
    }

    #[tokio::test]
    async fn test_update_summary_keeps_position() {
        let store = LocalStore::new();
        store.replace_summaries(vec![row("a", "A", 2), row("b", "B", 1)]).await;

        assert!(store.update_summary("b", |r| r.title = "Renamed".into()).await.unwrap());
        assert!(!store.update_summary("zz", |_| ()).await.unwrap());

        let summaries = store.summaries().await;
        assert_eq!(summaries[1], row("b", "Renamed", 1));
    }

    #[tokio::test]
    async fn test_subscribe_sees_revisions() {
        let store = LocalStore::new();
        let mut changes = store.subscribe();
        let before = *changes.borrow_and_update();

        store.upsert_summary(row("a", "A", 1)).await.unwrap();

        assert!(changes.has_changed().unwrap());
        assert!(*changes.borrow_and_update() > before);
    }
}
