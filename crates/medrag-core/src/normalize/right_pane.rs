//! Right-pane normalization.
//!
//! The retrieval backend has shipped the same panel under several names over
//! time. This module is the only place that knows about those names.

use super::value::{as_f64, as_string, as_year, field, string_field, string_list};
use crate::session::{
    BooleanItem, EVIDENCE_LIMIT, EvidenceItem, Overview, PlanLite, RankedDoc, RightPaneData,
    pubmed_url, snippet, sort_by_relevance,
};
use serde_json::Value;

const DOC_LIST_KEYS: &[&str] = &["results", "final_docs", "documents"];

/// Normalizes a right-pane payload.
///
/// Accepts either the pane itself or an enclosing object carrying it under
/// `rightPane` / `right_pane`.
pub fn normalize_right_pane(value: &Value) -> RightPaneData {
    let pane = field(value, &["rightPane", "right_pane"]).unwrap_or(value);
    if !pane.is_object() {
        return RightPaneData::default();
    }

    let raw_docs: Vec<&Value> = field(pane, DOC_LIST_KEYS)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter(|d| d.is_object()).collect())
        .unwrap_or_default();

    RightPaneData {
        results: normalize_ranked_docs(&raw_docs),
        booleans: normalize_booleans(field(pane, &["booleans", "buckets"])),
        overview: normalize_overview(pane),
        evidence: normalize_evidence(pane, &raw_docs),
        plan: normalize_plan(pane),
    }
}

/// Whether `value` carries any ranked-document list under a known name.
pub fn has_documents(value: &Value) -> bool {
    field(value, DOC_LIST_KEYS).is_some_and(Value::is_array)
}

/// Normalizes and orders ranked documents.
///
/// An explicit numeric `rank` on every document wins (ascending); otherwise
/// documents are ordered by [`sort_by_relevance`]. Both sorts are stable.
fn normalize_ranked_docs(raw_docs: &[&Value]) -> Vec<RankedDoc> {
    let mut ranked: Vec<(Option<f64>, RankedDoc)> = raw_docs
        .iter()
        .map(|raw| (field(raw, &["rank"]).and_then(as_f64), normalize_doc(raw)))
        .filter(|(_, doc)| doc.is_valid())
        .collect();

    let explicitly_ranked = !ranked.is_empty() && ranked.iter().all(|(rank, _)| rank.is_some());
    if explicitly_ranked {
        ranked.sort_by(|(a, _), (b, _)| a.unwrap_or(0.0).total_cmp(&b.unwrap_or(0.0)));
        return ranked.into_iter().map(|(_, doc)| doc).collect();
    }

    let mut docs: Vec<RankedDoc> = ranked.into_iter().map(|(_, doc)| doc).collect();
    sort_by_relevance(&mut docs);
    docs
}

fn normalize_doc(raw: &Value) -> RankedDoc {
    let pmid = string_field(raw, &["pmid", "id"]);
    let url = string_field(raw, &["url"]).or_else(|| pmid.as_deref().map(pubmed_url));
    RankedDoc {
        title: field(raw, &["title"]).and_then(as_string).unwrap_or_default(),
        journal: string_field(raw, &["journal", "source"]),
        year: field(raw, &["year", "pubYear"]).and_then(as_year),
        score: field(raw, &["score", "fused_raw"]).and_then(as_f64),
        r#abstract: string_field(raw, &["abstract"]),
        pmid,
        url,
    }
}

fn normalize_booleans(value: Option<&Value>) -> Vec<BooleanItem> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(query) => Some(BooleanItem {
                group: String::new(),
                query: query.clone(),
                note: String::new(),
            }),
            Value::Object(_) => Some(BooleanItem {
                group: field(item, &["group", "chunk"]).and_then(as_string).unwrap_or_default(),
                query: field(item, &["query", "boolean"]).and_then(as_string).unwrap_or_default(),
                note: field(item, &["note"]).and_then(as_string).unwrap_or_default(),
            }),
            _ => None,
        })
        .collect()
}

fn normalize_overview(pane: &Value) -> Option<Overview> {
    if let Some(overview) = field(pane, &["overview"]) {
        return match overview {
            Value::String(text) => Some(Overview::Summary(text.clone())),
            Value::Object(_) => Some(structured_overview(overview)),
            _ => None,
        };
    }
    pane.get("summary")
        .and_then(|summary| field(summary, &["answer"]))
        .filter(|answer| answer.is_object())
        .map(structured_overview)
}

fn structured_overview(value: &Value) -> Overview {
    Overview::Structured {
        conclusion: field(value, &["conclusion"]).and_then(as_string).unwrap_or_default(),
        key_findings: string_list(field(value, &["key_findings"])),
        quality_and_limits: string_list(field(value, &["quality_and_limits"])),
    }
}

/// Supplied evidence is taken as-is; otherwise it is derived from the first
/// source documents in their original order.
fn normalize_evidence(pane: &Value, raw_docs: &[&Value]) -> Vec<EvidenceItem> {
    if let Some(items) = field(pane, &["evidence"]).and_then(Value::as_array) {
        return items
            .iter()
            .filter(|item| item.is_object())
            .map(|item| EvidenceItem {
                n: field(item, &["n"]).and_then(Value::as_u64).map(|n| n as usize),
                pmid: string_field(item, &["pmid"]),
                year: field(item, &["year"]).and_then(as_year),
                journal: string_field(item, &["journal"]),
                title: field(item, &["title"]).and_then(as_string).unwrap_or_default(),
                snippet: field(item, &["snippet"]).and_then(as_string),
            })
            .collect();
    }

    raw_docs
        .iter()
        .take(EVIDENCE_LIMIT)
        .enumerate()
        .map(|(i, raw)| EvidenceItem {
            n: Some(i + 1),
            pmid: string_field(raw, &["pmid"]),
            year: field(raw, &["year"]).and_then(as_year),
            journal: string_field(raw, &["journal"]),
            title: field(raw, &["title"]).and_then(as_string).unwrap_or_default(),
            snippet: Some(
                field(raw, &["abstract"])
                    .and_then(as_string)
                    .map(|text| snippet(&text))
                    .unwrap_or_default(),
            ),
        })
        .collect()
}

fn normalize_plan(pane: &Value) -> PlanLite {
    let source = field(pane, &["plan"]).filter(|p| p.is_object()).unwrap_or(pane);
    PlanLite {
        chunks: string_list(field(source, &["chunks"])),
        time_tags: string_list(field(source, &["time_tags"])),
        exclusions: string_list(field(source, &["exclusions"])),
    }
}
