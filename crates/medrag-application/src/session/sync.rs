use medrag_core::error::{MedragError, Result};
use medrag_core::normalize::value::now_millis;
use medrag_core::normalize::{AskReply, normalize_ask_reply, normalize_session, normalize_session_list};
use medrag_core::session::{
    AskRequest, DEFAULT_SESSION_TITLE, Message, RightPaneData, Session, SessionApi, SessionSummary,
    UNTITLED_SESSION_TITLE,
};
use medrag_core::state::StateRepository;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::right_pane::build_right_pane;
use super::selector::ActiveSessionSelector;
use super::store::LocalStore;

/// Lifecycle of the most recent send for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendState {
    #[default]
    Idle,
    /// The user message is in the cache, the request is not out yet
    Optimistic,
    /// `/ask` is in flight
    AwaitingServer,
    Reconciled,
    Failed,
}

impl SendState {
    pub fn is_in_flight(self) -> bool {
        matches!(self, SendState::Optimistic | SendState::AwaitingServer)
    }
}

/// Outcome of a successful [`SessionSync::send`].
#[derive(Debug, Clone, PartialEq)]
pub struct SendReceipt {
    /// Session the exchange was filed under (server-asserted)
    pub session_id: String,
    pub user_message: Message,
    pub assistant: Option<Message>,
}

type SendTable = Arc<Mutex<HashMap<String, SendState>>>;

fn lock_sends(table: &SendTable) -> MutexGuard<'_, HashMap<String, SendState>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Guard for one in-flight send.
///
/// Dropping it before [`PendingSend::finish`] records `Failed`, so a
/// cancelled send never leaves its session stuck in `AwaitingServer`.
struct PendingSend {
    table: SendTable,
    session_id: String,
    finished: bool,
}

impl PendingSend {
    fn begin(table: &SendTable, session_id: &str) -> Result<Self> {
        let mut sends = lock_sends(table);
        if sends.get(session_id).is_some_and(|s| s.is_in_flight()) {
            return Err(MedragError::busy(session_id));
        }
        sends.insert(session_id.to_string(), SendState::Optimistic);
        Ok(Self {
            table: table.clone(),
            session_id: session_id.to_string(),
            finished: false,
        })
    }

    fn advance(&self, state: SendState) {
        tracing::debug!("[SessionSync] send {} -> {:?}", self.session_id, state);
        lock_sends(&self.table).insert(self.session_id.clone(), state);
    }

    fn finish(mut self, state: SendState) {
        self.advance(state);
        self.finished = true;
    }
}

impl Drop for PendingSend {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("[SessionSync] send for {} dropped before completion", self.session_id);
            lock_sends(&self.table).insert(self.session_id.clone(), SendState::Failed);
        }
    }
}

/// Merges an `/ask` reply into the session that holds the optimistic
/// user message.
///
/// The user message is added only if its id is missing; a server echo with
/// the same id replaces it, an echo under another id is ignored. An
/// assistant message identical to one already present (a replayed reply) is
/// not added again; a different answer whose id is taken gets the smallest
/// free `-N` suffix and is appended.
///
/// Returns the assistant message as stored.
pub fn merge_reply(session: &mut Session, user_message: &Message, reply: &AskReply, now: i64) -> Option<Message> {
    if !session.has_message(&user_message.id) {
        session.messages.push(user_message.clone());
    }
    if let Some(echo) = reply.echoed_user.as_ref().filter(|e| e.id == user_message.id) {
        session.upsert_message(echo.clone());
    }
    let stored = reply
        .assistant
        .as_ref()
        .map(|assistant| append_answer(session, assistant.clone()));
    if let Some(pane) = &reply.right_pane {
        session.right_pane = Some(pane.clone());
    }
    if let Some(title) = reply.session_title.as_ref().filter(|t| !t.is_empty()) {
        session.title = title.clone();
    }
    session.updated_at = now;
    stored
}

fn append_answer(session: &mut Session, mut answer: Message) -> Message {
    let replayed = session.messages.iter().any(|m| {
        m.id == answer.id && m.role == answer.role && m.content == answer.content && m.ts == answer.ts
    });
    if replayed {
        session.upsert_message(answer.clone());
        return answer;
    }
    if session.has_message(&answer.id) {
        let base = answer.id.clone();
        let mut suffix = 1;
        while session.has_message(&format!("{base}-{suffix}")) {
            suffix += 1;
        }
        answer.id = format!("{base}-{suffix}");
    }
    session.messages.push(answer.clone());
    answer
}

/// Carries over cached messages, pane and timestamp that a fetched
/// snapshot does not have yet.
fn keep_local_messages(fetched: &mut Session, cached: &Session) {
    for message in &cached.messages {
        if !fetched.has_message(&message.id) {
            fetched.messages.push(message.clone());
        }
    }
    if fetched.right_pane.is_none() {
        fetched.right_pane = cached.right_pane.clone();
    }
    fetched.updated_at = fetched.updated_at.max(cached.updated_at);
}

fn local_message_id(session: &Session) -> String {
    loop {
        let id = format!("u-{}", Uuid::new_v4());
        if !session.has_message(&id) {
            return id;
        }
    }
}

/// Client-side session synchronization.
///
/// `SessionSync` is responsible for:
/// - Listing, creating, renaming and deleting sessions against the backend
/// - Selecting a session and fetching its detail
/// - Sending messages with an optimistic local write and reconciling the reply
/// - Keeping the active-session selection consistent with the cache
///
/// Store locks are never held across a backend call.
pub struct SessionSync {
    api: Arc<dyn SessionApi>,
    store: LocalStore,
    selector: ActiveSessionSelector,
    sends: SendTable,
    /// Held while a send without a session picks or creates its target
    resolve_lock: tokio::sync::Mutex<()>,
}

impl SessionSync {
    /// Creates an engine over a backend and a persistence backend for the
    /// active session id.
    pub fn new(api: Arc<dyn SessionApi>, state_repository: Arc<dyn StateRepository>) -> Self {
        Self {
            api,
            store: LocalStore::new(),
            selector: ActiveSessionSelector::new(state_repository),
            sends: Arc::new(Mutex::new(HashMap::new())),
            resolve_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Read access to the cache. Writes go through engine operations.
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn selector(&self) -> &ActiveSessionSelector {
        &self.selector
    }

    /// Restores the persisted selection. Call once at startup.
    pub async fn restore(&self) -> Option<String> {
        self.selector.restore().await
    }

    pub async fn active_session_id(&self) -> Option<String> {
        self.selector.current().await
    }

    /// Cached detail of the active session.
    pub async fn active_session(&self) -> Option<Session> {
        let id = self.selector.current().await?;
        self.store.detail(&id).await
    }

    /// State of the latest send for `session_id`.
    pub fn send_state(&self, session_id: &str) -> SendState {
        lock_sends(&self.sends)
            .get(session_id)
            .copied()
            .unwrap_or_default()
    }

    /// Fetches the session list, most recent first, and replaces the cached list.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the backend call fails; the cache is unchanged.
    pub async fn list(&self) -> Result<Vec<SessionSummary>> {
        let payload = self.api.list_sessions().await?;
        let mut rows = normalize_session_list(&payload);
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        tracing::info!("[SessionSync] listed {} sessions", rows.len());
        self.store.replace_summaries(rows).await;
        Ok(self.store.summaries().await)
    }

    /// Selects the first cached summary if nothing is selected yet.
    pub async fn auto_select(&self) -> Result<Option<String>> {
        let summaries = self.store.summaries().await;
        self.selector.auto_select(&summaries).await
    }

    /// Re-arms auto-select and runs it against the current list, as when
    /// the session view is shown again.
    pub async fn remount(&self) -> Result<Option<String>> {
        self.selector.remount();
        self.auto_select().await
    }

    /// Selects `session_id` and refreshes its detail from the backend.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the session was deleted; the stale entry is dropped
    ///   and the selection cleared
    /// - `Transport` if the fetch fails; the selection and cache stay as they are
    pub async fn select(&self, session_id: &str) -> Result<Session> {
        if self.store.is_deleted(session_id).await {
            return Err(MedragError::session_not_found(session_id));
        }
        self.selector.select(session_id).await?;

        let before = self.store.detail(session_id).await;
        let payload = match self.api.get_session(session_id).await {
            Ok(payload) => payload,
            Err(err) if err.is_not_found() => {
                tracing::warn!("[SessionSync] session {} is gone on the server", session_id);
                self.forget(session_id).await?;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let mut fetched = normalize_session(&payload);
        fetched.id = session_id.to_string();

        let in_flight = self.send_state(session_id).is_in_flight();
        let seed = fetched.clone();
        let (session, _) = self
            .store
            .update_or_insert_detail(
                session_id,
                move || seed,
                |cached| {
                    // The cache moved while the request was out, or a send is
                    // pending: the snapshot may predate local messages.
                    if in_flight || before.as_ref() != Some(&*cached) {
                        keep_local_messages(&mut fetched, cached);
                    }
                    *cached = fetched;
                    cached.clone()
                },
            )
            .await?;

        let title = session.title.clone();
        self.store
            .update_summary(session_id, |row| row.title = title)
            .await?;
        Ok(session)
    }

    /// Creates a session, caches it and selects it.
    ///
    /// A blank title becomes `"New chat"`.
    pub async fn create(&self, title: &str) -> Result<Session> {
        let title = match title.trim() {
            "" => DEFAULT_SESSION_TITLE,
            t => t,
        };
        let payload = self.api.create_session(title).await?;

        let mut session = normalize_session(&payload);
        if session.id.is_empty() {
            return Err(MedragError::validation(
                "Server did not return an id for the new session",
            ));
        }
        if session.title == UNTITLED_SESSION_TITLE {
            session.title = title.to_string();
        }

        self.store.upsert_detail(session.clone()).await?;
        self.store.upsert_summary(session.summary()).await?;
        self.selector.select(&session.id).await?;
        tracing::info!("[SessionSync] created session {} ({})", session.id, session.title);
        Ok(session)
    }

    /// Renames a session. The cache changes only after the server accepts.
    ///
    /// # Errors
    ///
    /// - `Validation` for a blank title
    /// - `NotFound` if the session was deleted
    /// - `Transport` if the backend call fails
    pub async fn rename(&self, session_id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(MedragError::validation("Session title must not be empty"));
        }
        if self.store.is_deleted(session_id).await {
            return Err(MedragError::session_not_found(session_id));
        }

        self.api.rename_session(session_id, title).await?;

        let now = now_millis();
        self.store
            .update_summary(session_id, |row| {
                row.title = title.to_string();
                row.updated_at = now;
            })
            .await?;
        let updated = self
            .store
            .update_detail(session_id, |session| {
                session.title = title.to_string();
                session.updated_at = now;
            })
            .await;
        match updated {
            Ok(()) => {}
            // Detail not cached: only the summary row exists.
            Err(err) if err.is_not_found() && !self.store.is_deleted(session_id).await => {}
            Err(err) => return Err(err),
        }

        tracing::info!("[SessionSync] renamed {} to {}", session_id, title);
        Ok(())
    }

    /// Deletes a session. Local state is removed only once the server confirms.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the server no longer knows the session; local state is
    ///   removed anyway
    /// - `Transport` if the backend call fails; nothing changes
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        match self.api.delete_session(session_id).await {
            Ok(()) => {
                self.forget(session_id).await?;
                tracing::info!("[SessionSync] deleted session {}", session_id);
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                self.forget(session_id).await?;
                Err(err)
            }
            Err(err) => {
                tracing::warn!("[SessionSync] delete of {} failed: {}", session_id, err);
                Err(err)
            }
        }
    }

    async fn forget(&self, session_id: &str) -> Result<()> {
        self.store.remove(session_id).await;
        self.selector.clear_if(session_id).await?;
        Ok(())
    }

    /// Sends a message.
    ///
    /// With no `session_id` the target is the active session, else the
    /// first listed one, else a freshly created `"New chat"`.
    ///
    /// The user message is cached before the request goes out and stays
    /// there if the request fails.
    ///
    /// # Errors
    ///
    /// - `Validation` for blank text
    /// - `Busy` if a send for the session is already in flight
    /// - `NotFound` if the session was deleted, before or during the request
    /// - `Transport` if the request fails
    pub async fn send(&self, session_id: Option<&str>, text: &str) -> Result<SendReceipt> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MedragError::validation("Message text must not be empty"));
        }

        let requested = match session_id {
            Some(id) => id.to_string(),
            None => self.resolve_send_target().await?,
        };
        if self.store.is_deleted(&requested).await {
            return Err(MedragError::session_not_found(requested));
        }

        let pending = PendingSend::begin(&self.sends, &requested)?;
        let (user_message, provisional) = self.apply_optimistic(&requested, text).await?;
        pending.advance(SendState::AwaitingServer);

        let request = AskRequest {
            session_id: requested.clone(),
            text: text.to_string(),
            client_message_id: user_message.id.clone(),
        };
        let payload = match self.api.ask(&request).await {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!("[SessionSync] send to {} failed: {}", requested, err);
                pending.finish(SendState::Failed);
                return Err(err);
            }
        };

        let reply = normalize_ask_reply(&payload, &requested);
        let server_id = if reply.session_id.is_empty() {
            requested.clone()
        } else {
            reply.session_id.clone()
        };

        for id in [&requested, &server_id] {
            if self.store.is_deleted(id).await {
                tracing::warn!("[SessionSync] reply for deleted session {} dropped", id);
                pending.finish(SendState::Failed);
                return Err(MedragError::session_not_found(id.as_str()));
            }
        }

        if server_id != requested {
            self.move_optimistic(&requested, &server_id, &user_message, provisional)
                .await?;
        }

        let now = now_millis();
        let ((title, assistant), _) = self
            .store
            .update_or_insert_detail(
                &server_id,
                || Session::new(server_id.as_str(), DEFAULT_SESSION_TITLE, now),
                |session| {
                    let assistant = merge_reply(session, &user_message, &reply, now);
                    (session.title.clone(), assistant)
                },
            )
            .await?;

        let title = match self.store.summary(&server_id).await {
            Some(row) if reply.session_title.is_none() => row.title,
            _ if title.trim().is_empty() => DEFAULT_SESSION_TITLE.to_string(),
            _ => title,
        };
        self.store
            .upsert_summary(SessionSummary {
                id: server_id.clone(),
                title,
                updated_at: now,
            })
            .await?;

        pending.finish(SendState::Reconciled);
        tracing::debug!(
            "[SessionSync] reconciled send {} in {}",
            user_message.id,
            server_id
        );

        Ok(SendReceipt {
            session_id: server_id,
            user_message,
            assistant,
        })
    }

    async fn resolve_send_target(&self) -> Result<String> {
        let _guard = self.resolve_lock.lock().await;
        if let Some(id) = self.selector.current().await {
            return Ok(id);
        }
        if let Some(first) = self.store.summaries().await.into_iter().next() {
            self.selector.select(&first.id).await?;
            return Ok(first.id);
        }
        Ok(self.create(DEFAULT_SESSION_TITLE).await?.id)
    }

    /// Appends the user message to the cached session, creating a
    /// provisional entry when none is cached.
    async fn apply_optimistic(&self, session_id: &str, text: &str) -> Result<(Message, bool)> {
        let now = now_millis();
        let title = self
            .store
            .summary(session_id)
            .await
            .map(|row| row.title)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SESSION_TITLE.to_string());

        let (message, provisional) = self
            .store
            .update_or_insert_detail(
                session_id,
                || Session::new(session_id, title, now),
                |session| {
                    let message = Message::user(local_message_id(session), text, now);
                    session.messages.push(message.clone());
                    message
                },
            )
            .await?;
        tracing::debug!(
            "[SessionSync] optimistic message {} in {} (provisional={})",
            message.id,
            session_id,
            provisional
        );
        Ok((message, provisional))
    }

    /// Moves the optimistic message from the requested session to the one
    /// the server filed it under. A cached server detail gets the message
    /// right away.
    async fn move_optimistic(
        &self,
        requested: &str,
        server_id: &str,
        user_message: &Message,
        provisional: bool,
    ) -> Result<()> {
        tracing::info!(
            "[SessionSync] server filed message under {} instead of {}",
            server_id,
            requested
        );
        if let Some(cached) = self.store.detail(server_id).await {
            if !cached.has_message(&user_message.id) {
                self.store
                    .append_messages(server_id, vec![user_message.clone()])
                    .await?;
            }
        }
        if provisional {
            self.store.discard_detail(requested).await;
        } else {
            match self
                .store
                .update_detail(requested, |session| session.take_message(&user_message.id))
                .await
            {
                Ok(_) => {}
                Err(err) if err.is_not_found() && !self.store.is_deleted(requested).await => {}
                Err(err) => return Err(err),
            }
        }
        self.selector.repoint(requested, server_id).await?;
        Ok(())
    }

    /// Builds the reference panel for the active session.
    pub async fn right_pane(&self, selected_message_id: Option<&str>) -> RightPaneData {
        let Some(session_id) = self.selector.current().await else {
            return RightPaneData::default();
        };
        let session = self.store.detail(&session_id).await;
        let selected = selected_message_id
            .and_then(|id| session.as_ref().and_then(|s| s.find_message(id)));
        build_right_pane(session.as_ref(), selected)
    }
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
