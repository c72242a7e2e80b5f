//! Right-pane view model.
//!
//! The panel shows the references of the message the user picked, falling
//! back to the pane stored with the session.

use medrag_core::session::{EVIDENCE_LIMIT, Message, RankedDoc, RightPaneData, Session, sort_by_relevance};
use std::collections::HashSet;

/// Builds the panel for `session`, preferring `selected`'s references.
pub fn build_right_pane(session: Option<&Session>, selected: Option<&Message>) -> RightPaneData {
    if let Some(message) = selected.filter(|m| !m.references.is_empty()) {
        let pane = pane_from_message(message);
        if !pane.results.is_empty() {
            return pane;
        }
    }

    match session.and_then(|s| s.right_pane.as_ref()) {
        Some(stored) => {
            let mut pane = stored.clone();
            pane.results = dedup_results(pane.results);
            pane
        }
        None => RightPaneData::default(),
    }
}

fn pane_from_message(message: &Message) -> RightPaneData {
    let mut results: Vec<RankedDoc> = message
        .references
        .iter()
        .map(RankedDoc::from)
        .filter(RankedDoc::is_valid)
        .collect();
    sort_by_relevance(&mut results);
    let results = dedup_results(results);

    let evidence = results
        .iter()
        .take(EVIDENCE_LIMIT)
        .enumerate()
        .map(|(i, doc)| doc.to_evidence(i + 1))
        .collect();

    RightPaneData {
        results,
        evidence,
        ..RightPaneData::default()
    }
}

/// Collapses documents sharing `(pmid, url, title)`; the first one wins.
pub fn dedup_results(docs: Vec<RankedDoc>) -> Vec<RankedDoc> {
    let mut seen = HashSet::new();
    docs.into_iter().filter(|doc| seen.insert(doc.dedup_key())).collect()
}
