//! Session domain model.
//!
//! This module contains the canonical Session entity and its lightweight
//! list projection. Every payload shape the backend has ever produced is
//! folded into these types by [`crate::normalize`].

use super::message::Message;
use super::reference::RightPaneData;
use serde::{Deserialize, Serialize};

/// Title given to sessions created implicitly by a first message.
pub const DEFAULT_SESSION_TITLE: &str = "New chat";

/// Title used when the server omits one.
pub const UNTITLED_SESSION_TITLE: &str = "Untitled";

/// A conversation thread as cached by the client.
///
/// Instances are owned by the local store; everything else works on clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Server-assigned session identifier
    pub id: String,
    /// Human-readable session title
    pub title: String,
    /// Creation time (epoch milliseconds)
    pub created_at: i64,
    /// Last update time (epoch milliseconds)
    pub updated_at: i64,
    /// Ordered conversation history
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Reference panel stored with the session, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_pane: Option<RightPaneData>,
}

impl Session {
    /// Creates an empty session with both timestamps set to `now`.
    pub fn new(id: impl Into<String>, title: impl Into<String>, now: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            right_pane: None,
        }
    }

    /// Projects the session onto its list row.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            updated_at: self.updated_at,
        }
    }

    pub fn has_message(&self, message_id: &str) -> bool {
        self.messages.iter().any(|m| m.id == message_id)
    }

    pub fn find_message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    /// Appends `message`, or replaces the message already carrying its id.
    ///
    /// Applying the same message twice leaves the sequence unchanged.
    pub fn upsert_message(&mut self, message: Message) {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => self.messages.push(message),
        }
    }

    /// Removes and returns the message with the given id.
    pub fn take_message(&mut self, message_id: &str) -> Option<Message> {
        let index = self.messages.iter().position(|m| m.id == message_id)?;
        Some(self.messages.remove(index))
    }
}

/// Lightweight projection of a session for list display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_message_is_idempotent() {
        let mut session = Session::new("s1", "Chat", 1);
        let msg = Message::user("m1", "hello", 2);

        session.upsert_message(msg.clone());
        session.upsert_message(msg);

        assert_eq!(session.messages.len(), 1);
    }

    #[test]
    fn test_upsert_message_replaces_in_place() {
        let mut session = Session::new("s1", "Chat", 1);
        session.upsert_message(Message::user("m1", "first", 2));
        session.upsert_message(Message::user("m2", "second", 3));
        session.upsert_message(Message::user("m1", "edited", 4));

        let contents: Vec<_> = session.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["edited", "second"]);
    }

    #[test]
    fn test_serializes_camel_case() {
        let session = Session::new("s1", "Chat", 10);
        let value = serde_json::to_value(session.summary()).unwrap();
        assert_eq!(value["updatedAt"], 10);
    }
}
