//! Conversation message types.
//!
//! This module contains types for representing messages in a conversation,
//! including roles, content and the references attached to an answer.

use super::reference::Reference;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the role of a message in a conversation.
///
/// The wire treats the role as an open string, so anything other than the
/// three canonical roles survives a round trip as [`MessageRole::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the AI assistant.
    Assistant,
    /// System-generated message.
    System,
    /// A role this client does not know about.
    Other(String),
}

impl MessageRole {
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Other(role) => role,
        }
    }

    /// Whether the UI knows how to render this role.
    pub fn is_canonical(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<&str> for MessageRole {
    fn from(value: &str) -> Self {
        match value {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "system" => Self::System,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for MessageRole {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" | "assistant" | "system" => Self::from(value.as_str()),
            _ => Self::Other(value),
        }
    }
}

impl From<MessageRole> for String {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::Other(role) => role,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier, unique within the owning session.
    pub id: String,
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
    /// Creation time (epoch milliseconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    /// Bibliographic references backing an assistant answer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
}

impl Message {
    /// Creates a user message stamped with the given id and time.
    pub fn user(id: impl Into<String>, content: impl Into<String>, ts: i64) -> Self {
        Self {
            id: id.into(),
            role: MessageRole::User,
            content: content.into(),
            ts: Some(ts),
            references: Vec::new(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_unknown_values() {
        let role: MessageRole = serde_json::from_str("\"tool\"").unwrap();
        assert_eq!(role, MessageRole::Other("tool".to_string()));
        assert!(!role.is_canonical());
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"tool\"");
    }

    #[test]
    fn test_canonical_roles_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&MessageRole::Assistant).unwrap(), "\"assistant\"");
        let role: MessageRole = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(role, MessageRole::System);
    }
}
