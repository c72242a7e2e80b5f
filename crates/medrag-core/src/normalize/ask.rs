//! `/ask` reply normalization.
//!
//! Two reply conventions exist: the current one,
//! `{session_id, message, user_message?, rightPane|results|documents?}`, and
//! a legacy endpoint that answers with the whole updated session.

use super::message::{normalize_message_at, normalize_references};
use super::right_pane::{has_documents, normalize_right_pane};
use super::session::normalize_session_at;
use super::value::{field, now_millis, string_field};
use crate::session::{Message, MessageRole, RightPaneData};
use serde_json::Value;

/// Canonical view of an `/ask` reply.
#[derive(Debug, Clone, PartialEq)]
pub struct AskReply {
    /// Session the server filed the exchange under. Authoritative.
    pub session_id: String,
    /// The assistant answer. Absent only when a legacy full-session reply
    /// contained no assistant message.
    pub assistant: Option<Message>,
    /// The user message as echoed back by the server, if it was.
    pub echoed_user: Option<Message>,
    /// Panel content carried by the reply.
    pub right_pane: Option<RightPaneData>,
    /// Session title, when the reply carried a full session.
    pub session_title: Option<String>,
}

/// Normalizes an `/ask` reply. `requested_session_id` is used when the
/// reply does not name a session.
pub fn normalize_ask_reply(payload: &Value, requested_session_id: &str) -> AskReply {
    normalize_ask_reply_at(payload, requested_session_id, now_millis())
}

pub(crate) fn normalize_ask_reply_at(payload: &Value, requested_session_id: &str, now: i64) -> AskReply {
    if is_full_session(payload) {
        return full_session_reply(payload, requested_session_id, now);
    }

    let mut assistant = normalize_message_at(
        field(payload, &["message"]).unwrap_or(&Value::Null),
        MessageRole::Assistant,
        now,
    );
    if assistant.references.is_empty() {
        assistant.references = normalize_references(field(payload, &["references"]));
    }

    let echoed_user = field(payload, &["user_message", "userMessage"])
        .filter(|m| m.is_object())
        .map(|m| normalize_message_at(m, MessageRole::User, now));

    let right_pane = if field(payload, &["rightPane", "right_pane"]).is_some() || has_documents(payload) {
        Some(normalize_right_pane(payload))
    } else {
        None
    };

    AskReply {
        session_id: string_field(payload, &["session_id", "sessionId"])
            .unwrap_or_else(|| requested_session_id.to_string()),
        assistant: Some(assistant),
        echoed_user,
        right_pane,
        session_title: None,
    }
}

fn is_full_session(payload: &Value) -> bool {
    if field(payload, &["message"]).is_some() {
        return false;
    }
    let s = field(payload, &["session"]).unwrap_or(payload);
    field(s, &["messages"]).is_some_and(Value::is_array)
}

fn full_session_reply(payload: &Value, requested_session_id: &str, now: i64) -> AskReply {
    let mut session = normalize_session_at(payload, now);
    let last_with_role = |role: MessageRole| {
        session
            .messages
            .iter()
            .rev()
            .find(|m| m.role == role)
            .cloned()
    };
    let assistant = last_with_role(MessageRole::Assistant);
    let echoed_user = last_with_role(MessageRole::User);

    let session_id = if session.id.is_empty() {
        string_field(payload, &["session_id", "sessionId"])
            .unwrap_or_else(|| requested_session_id.to_string())
    } else {
        std::mem::take(&mut session.id)
    };

    AskReply {
        session_id,
        assistant,
        echoed_user,
        right_pane: session.right_pane,
        session_title: Some(session.title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 500;

    #[test]
    fn test_current_reply_shape() {
        let reply = normalize_ask_reply_at(
            &json!({
                "session_id": "server-1",
                "message": {"id": "a1", "role": "assistant", "content": "answer",
                            "references": [{"pmid": "1", "title": "Ref"}]},
                "rightPane": {"results": [{"title": "doc"}]}
            }),
            "local",
            NOW,
        );
        assert_eq!(reply.session_id, "server-1");
        let assistant = reply.assistant.unwrap();
        assert_eq!(assistant.id, "a1");
        assert_eq!(assistant.references.len(), 1);
        assert_eq!(reply.right_pane.unwrap().results.len(), 1);
        assert!(reply.echoed_user.is_none());
    }

    #[test]
    fn test_defaults_when_message_missing() {
        let reply = normalize_ask_reply_at(&json!({}), "s1", NOW);
        assert_eq!(reply.session_id, "s1");
        let assistant = reply.assistant.unwrap();
        assert_eq!(assistant.role, MessageRole::Assistant);
        assert_eq!(assistant.id, "assistant-500");
        assert!(reply.right_pane.is_none());
    }

    #[test]
    fn test_top_level_references_and_documents() {
        let reply = normalize_ask_reply_at(
            &json!({
                "message": {"content": "a"},
                "references": [{"title": "From top"}],
                "documents": [{"title": "d", "score": 0.1}]
            }),
            "s1",
            NOW,
        );
        assert_eq!(reply.assistant.unwrap().references[0].title, "From top");
        assert_eq!(reply.right_pane.unwrap().results[0].title, "d");
    }

    #[test]
    fn test_echoed_user_message() {
        let reply = normalize_ask_reply_at(
            &json!({
                "message": {"id": "a1", "content": "a"},
                "user_message": {"id": "u-1", "content": "q"}
            }),
            "s1",
            NOW,
        );
        assert_eq!(reply.echoed_user.unwrap().id, "u-1");
    }

    #[test]
    fn test_legacy_full_session_reply() {
        let reply = normalize_ask_reply_at(
            &json!({
                "id": "s9",
                "title": "Legacy",
                "messages": [
                    {"id": "u1", "role": "user", "content": "q"},
                    {"id": "a1", "role": "assistant", "content": "a"}
                ],
                "rightPane": {"results": [{"title": "doc"}]}
            }),
            "s1",
            NOW,
        );
        assert_eq!(reply.session_id, "s9");
        assert_eq!(reply.assistant.unwrap().id, "a1");
        assert_eq!(reply.echoed_user.unwrap().id, "u1");
        assert_eq!(reply.session_title.as_deref(), Some("Legacy"));
        assert!(reply.right_pane.is_some());
    }
}
