//! Backend session API trait.
//!
//! Defines the interface to the remote session service. Implementations
//! return raw JSON; callers run it through [`crate::normalize`] before it
//! touches any cached state.

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Body of a `POST /ask` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AskRequest {
    pub session_id: String,
    pub text: String,
    /// Id of the optimistic user message, so the server can echo it back.
    pub client_message_id: String,
}

/// An abstract client for the session REST backend.
///
/// # Errors
///
/// Implementations report an unknown id as [`crate::MedragError::NotFound`]
/// and every other failure as [`crate::MedragError::Transport`].
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// `GET /sessions`
    async fn list_sessions(&self) -> Result<Value>;

    /// `POST /sessions {title}`
    async fn create_session(&self, title: &str) -> Result<Value>;

    /// `GET /sessions/{id}`
    async fn get_session(&self, session_id: &str) -> Result<Value>;

    /// `PATCH /sessions/{id} {title}`
    async fn rename_session(&self, session_id: &str, title: &str) -> Result<Value>;

    /// `DELETE /sessions/{id}`
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    /// `POST /ask {session_id, text, client_message_id}`
    async fn ask(&self, request: &AskRequest) -> Result<Value>;
}
