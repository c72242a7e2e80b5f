//! Message and reference normalization.

use super::value::{as_f64, as_string, as_year, field, now_millis, parse_timestamp, string_field};
use crate::session::{Message, MessageRole, Reference};
use serde_json::Value;
use std::collections::HashSet;

/// Normalizes one message payload.
///
/// `default_role` applies when the payload has no usable role: history
/// entries default to the user, `/ask` replies to the assistant.
pub fn normalize_message(value: &Value, default_role: MessageRole) -> Message {
    normalize_message_at(value, default_role, now_millis())
}

pub(crate) fn normalize_message_at(value: &Value, default_role: MessageRole, now: i64) -> Message {
    let role = field(value, &["role"])
        .and_then(as_string)
        .filter(|r| !r.is_empty())
        .map(MessageRole::from)
        .unwrap_or(default_role);

    let ts = field(value, &["ts", "timestamp", "created_at", "createdAt"])
        .and_then(parse_timestamp)
        .unwrap_or(now);

    let id = string_field(value, &["id"]).unwrap_or_else(|| format!("{}-{}", role, ts));

    let content = field(value, &["content", "text"])
        .and_then(as_string)
        .unwrap_or_default();

    Message {
        id,
        role,
        content,
        ts: Some(ts),
        references: normalize_references(field(value, &["references"])),
    }
}

/// Normalizes a message history, keeping ids unique.
///
/// A repeated id gets the smallest free `-N` suffix, so normalizing the same
/// payload twice yields the same ids.
pub fn normalize_messages(value: Option<&Value>) -> Vec<Message> {
    normalize_messages_at(value, now_millis())
}

pub(crate) fn normalize_messages_at(value: Option<&Value>, now: i64) -> Vec<Message> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| item.is_object())
        .map(|item| {
            let mut message = normalize_message_at(item, MessageRole::User, now);
            if !seen.insert(message.id.clone()) {
                let base = message.id.clone();
                let mut suffix = 1;
                while seen.contains(&format!("{base}-{suffix}")) {
                    suffix += 1;
                }
                message.id = format!("{base}-{suffix}");
                seen.insert(message.id.clone());
            }
            message
        })
        .collect()
}

/// Normalizes a reference list, dropping entries without title and pmid.
pub fn normalize_references(value: Option<&Value>) -> Vec<Reference> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.is_object())
                .map(normalize_reference)
                .filter(Reference::is_valid)
                .collect()
        })
        .unwrap_or_default()
}

fn normalize_reference(value: &Value) -> Reference {
    Reference {
        pmid: string_field(value, &["pmid", "id"]),
        title: field(value, &["title"]).and_then(as_string).unwrap_or_default(),
        journal: string_field(value, &["journal"]),
        year: field(value, &["year", "pubYear"]).and_then(as_year),
        score: field(value, &["score", "fused_raw"]).and_then(as_f64),
        url: string_field(value, &["url"]),
        r#abstract: string_field(value, &["abstract"]),
        source: string_field(value, &["source"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_000;

    #[test]
    fn test_missing_id_derives_from_role_and_ts() {
        let msg = normalize_message_at(&json!({"role": "assistant", "ts": 42}), MessageRole::User, NOW);
        assert_eq!(msg.id, "assistant-42");
        assert_eq!(msg.content, "");
        assert_eq!(msg.ts, Some(42));
    }

    #[test]
    fn test_unparseable_ts_defaults_to_now() {
        let msg = normalize_message_at(&json!({"ts": "yesterday-ish"}), MessageRole::User, NOW);
        assert_eq!(msg.ts, Some(NOW));
        assert_eq!(msg.id, "user-1000");
    }

    #[test]
    fn test_unknown_role_preserved() {
        let msg = normalize_message_at(&json!({"id": "x", "role": "tool"}), MessageRole::User, NOW);
        assert_eq!(msg.role, MessageRole::Other("tool".to_string()));
    }

    #[test]
    fn test_default_role_applies() {
        let msg = normalize_message_at(&json!({"content": "hi"}), MessageRole::Assistant, NOW);
        assert_eq!(msg.role, MessageRole::Assistant);
    }

    #[test]
    fn test_duplicate_ids_get_stable_suffixes() {
        let payload = json!([
            {"role": "user", "ts": 5, "content": "a"},
            {"role": "user", "ts": 5, "content": "b"},
            {"role": "user", "ts": 5, "content": "c"},
        ]);
        let first = normalize_messages_at(Some(&payload), NOW);
        let second = normalize_messages_at(Some(&payload), NOW);

        let ids: Vec<_> = first.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["user-5", "user-5-1", "user-5-2"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_non_array_messages_become_empty() {
        assert!(normalize_messages_at(Some(&json!("oops")), NOW).is_empty());
        assert!(normalize_messages_at(None, NOW).is_empty());
    }

    #[test]
    fn test_references_drop_invalid_entries() {
        let refs = normalize_references(Some(&json!([
            {"title": "Kept"},
            {"pmid": 77},
            {"journal": "Dropped"},
            "garbage",
        ])));
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].pmid.as_deref(), Some("77"));
    }
}
