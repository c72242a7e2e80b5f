//! Session and session-list normalization.

use super::message::normalize_messages_at;
use super::right_pane::normalize_right_pane;
use super::value::{as_string, field, now_millis, parse_timestamp, string_field};
use crate::session::{Session, SessionSummary, UNTITLED_SESSION_TITLE};
use serde_json::Value;

/// Normalizes a session payload, top-level or nested under `session`.
///
/// An empty `id` means the payload did not identify a session; callers that
/// need one must check for it.
pub fn normalize_session(payload: &Value) -> Session {
    normalize_session_at(payload, now_millis())
}

pub(crate) fn normalize_session_at(payload: &Value, now: i64) -> Session {
    let s = unwrap_session(payload);

    let created_at = field(s, &["createdAt", "created_at"])
        .and_then(parse_timestamp)
        .unwrap_or(now);
    let updated_at = field(s, &["updatedAt", "updated_at"])
        .and_then(parse_timestamp)
        .unwrap_or(created_at);

    let right_pane = field(s, &["rightPane", "right_pane"])
        .filter(|pane| pane.is_object())
        .map(normalize_right_pane);

    Session {
        id: session_id(s).unwrap_or_default(),
        title: session_title(s),
        created_at,
        updated_at,
        messages: normalize_messages_at(field(s, &["messages"]), now),
        right_pane,
    }
}

/// Normalizes a `GET /sessions` payload.
///
/// Accepts a bare array or one nested under `items` or `sessions`. Rows
/// without an id are dropped; server order is preserved.
pub fn normalize_session_list(payload: &Value) -> Vec<SessionSummary> {
    let rows = match payload {
        Value::Array(rows) => Some(rows),
        _ => field(payload, &["items", "sessions"]).and_then(Value::as_array),
    };

    rows.map(|rows| rows.iter().filter_map(normalize_summary).collect())
        .unwrap_or_default()
}

fn normalize_summary(row: &Value) -> Option<SessionSummary> {
    let s = unwrap_session(row);
    let Some(id) = session_id(s) else {
        tracing::debug!("dropping session row without an id");
        return None;
    };
    let updated_at = field(s, &["updatedAt", "updated_at", "createdAt", "created_at"])
        .and_then(parse_timestamp)
        .unwrap_or(0);
    Some(SessionSummary {
        id,
        title: session_title(s),
        updated_at,
    })
}

fn unwrap_session(payload: &Value) -> &Value {
    field(payload, &["session"])
        .filter(|s| s.is_object())
        .unwrap_or(payload)
}

fn session_id(s: &Value) -> Option<String> {
    string_field(s, &["id", "session_id", "sessionId"])
}

fn session_title(s: &Value) -> String {
    field(s, &["title"])
        .and_then(as_string)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| UNTITLED_SESSION_TITLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 9_999;

    #[test]
    fn test_nested_session_key() {
        let session = normalize_session_at(
            &json!({"session": {"id": "s1", "title": "Nested", "messages": [{"role": "user", "content": "q", "ts": 1}]}}),
            NOW,
        );
        assert_eq!(session.id, "s1");
        assert_eq!(session.title, "Nested");
        assert_eq!(session.messages.len(), 1);
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let session = normalize_session_at(&json!({"id": 7}), NOW);
        assert_eq!(session.id, "7");
        assert_eq!(session.title, "Untitled");
        assert_eq!(session.created_at, NOW);
        assert_eq!(session.updated_at, NOW);
        assert!(session.messages.is_empty());
        assert!(session.right_pane.is_none());
    }

    #[test]
    fn test_messages_not_a_sequence() {
        let session = normalize_session_at(&json!({"id": "s", "messages": {"0": {}}}), NOW);
        assert!(session.messages.is_empty());
    }

    #[test]
    fn test_snake_case_timestamps_and_pane() {
        let session = normalize_session_at(
            &json!({
                "id": "s",
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": 1_704_067_300_000i64,
                "right_pane": {"results": [{"title": "doc"}]}
            }),
            NOW,
        );
        assert_eq!(session.created_at, 1_704_067_200_000);
        assert_eq!(session.updated_at, 1_704_067_300_000);
        assert_eq!(session.right_pane.unwrap().results.len(), 1);
    }

    #[test]
    fn test_missing_id_is_empty() {
        assert!(normalize_session_at(&json!({"title": "no id"}), NOW).id.is_empty());
        assert!(normalize_session_at(&json!(null), NOW).id.is_empty());
    }

    #[test]
    fn test_list_shapes() {
        let row = json!({"id": "a", "title": "A", "updatedAt": 3});
        for payload in [json!([row]), json!({"items": [row]}), json!({"sessions": [row]})] {
            let rows = normalize_session_list(&payload);
            assert_eq!(
                rows,
                vec![SessionSummary {
                    id: "a".to_string(),
                    title: "A".to_string(),
                    updated_at: 3,
                }]
            );
        }
    }

    #[test]
    fn test_list_drops_rows_without_id() {
        let rows = normalize_session_list(&json!([{"title": "ghost"}, {"id": "real"}]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Untitled");
        assert_eq!(rows[0].updated_at, 0);
    }

    #[test]
    fn test_list_garbage_is_empty() {
        assert!(normalize_session_list(&json!("nope")).is_empty());
        assert!(normalize_session_list(&json!({"items": 3})).is_empty());
    }
}
