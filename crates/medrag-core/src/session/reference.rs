//! Bibliographic references and the right-pane aggregate built from them.

use serde::{Deserialize, Serialize};

/// Public lookup page for a PubMed id. `{pmid}` is replaced by the id.
pub const PUBMED_URL_TEMPLATE: &str = "https://pubmed.ncbi.nlm.nih.gov/{pmid}/";

/// Maximum number of documents summarised into the evidence list.
pub const EVIDENCE_LIMIT: usize = 20;

/// Maximum snippet length (in characters) for evidence entries.
pub const EVIDENCE_SNIPPET_CHARS: usize = 320;

/// Builds the public lookup URL for a PubMed id.
pub fn pubmed_url(pmid: &str) -> String {
    PUBMED_URL_TEMPLATE.replace("{pmid}", pmid)
}

/// A reference attached to an assistant message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#abstract: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Reference {
    /// A reference needs at least a title or a pmid to be shown.
    pub fn is_valid(&self) -> bool {
        !self.title.is_empty() || self.pmid.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// A ranked document as displayed in the right pane.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RankedDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#abstract: Option<String>,
}

impl RankedDoc {
    pub fn is_valid(&self) -> bool {
        !self.title.is_empty() || self.pmid.is_some()
    }

    /// Composite identity used to collapse duplicates in the panel.
    pub fn dedup_key(&self) -> (String, String, String) {
        (
            self.pmid.clone().unwrap_or_default(),
            self.url.clone().unwrap_or_default(),
            self.title.clone(),
        )
    }

    /// Evidence line for this document at 1-based position `n`.
    pub fn to_evidence(&self, n: usize) -> EvidenceItem {
        EvidenceItem {
            n: Some(n),
            pmid: self.pmid.clone(),
            year: self.year,
            journal: self.journal.clone(),
            title: self.title.clone(),
            snippet: self.r#abstract.as_deref().map(snippet),
        }
    }
}

impl From<&Reference> for RankedDoc {
    fn from(reference: &Reference) -> Self {
        let pmid = reference.pmid.clone().filter(|p| !p.is_empty());
        let url = reference
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| pmid.as_deref().map(pubmed_url));
        Self {
            pmid,
            title: reference.title.clone(),
            journal: reference.journal.clone().or_else(|| reference.source.clone()),
            year: reference.year,
            score: reference.score,
            url,
            r#abstract: reference.r#abstract.clone(),
        }
    }
}

/// Truncates an abstract to the evidence snippet length, on a char boundary.
pub fn snippet(text: &str) -> String {
    text.chars().take(EVIDENCE_SNIPPET_CHARS).collect()
}

/// Orders documents best first: score descending (missing = -1), then year
/// descending (missing = 0). The sort is stable.
pub fn sort_by_relevance(docs: &mut [RankedDoc]) {
    docs.sort_by(|a, b| {
        let score_a = a.score.unwrap_or(-1.0);
        let score_b = b.score.unwrap_or(-1.0);
        score_b
            .total_cmp(&score_a)
            .then_with(|| b.year.unwrap_or(0).cmp(&a.year.unwrap_or(0)))
    });
}

/// One boolean query issued by the retrieval planner.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BooleanItem {
    pub group: String,
    pub query: String,
    #[serde(default)]
    pub note: String,
}

/// One numbered line of the evidence pack.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvidenceItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// AI overview of the evidence: either free text or a structured answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Overview {
    Summary(String),
    Structured {
        conclusion: String,
        #[serde(default)]
        key_findings: Vec<String>,
        #[serde(default)]
        quality_and_limits: Vec<String>,
    },
}

/// Query plan used by the retriever.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanLite {
    #[serde(default)]
    pub chunks: Vec<String>,
    #[serde(default)]
    pub time_tags: Vec<String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
}

/// Display aggregate for the reference panel. Never authoritative.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RightPaneData {
    #[serde(default)]
    pub results: Vec<RankedDoc>,
    #[serde(default)]
    pub booleans: Vec<BooleanItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<Overview>,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    #[serde(default)]
    pub plan: PlanLite,
}

impl RightPaneData {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
            && self.booleans.is_empty()
            && self.overview.is_none()
            && self.evidence.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str, score: Option<f64>, year: Option<i32>) -> RankedDoc {
        RankedDoc {
            title: title.to_string(),
            score,
            year,
            ..Default::default()
        }
    }

    #[test]
    fn test_sort_by_relevance_score_then_year() {
        let mut docs = vec![
            doc("doc1", Some(0.5), Some(2020)),
            doc("doc2", Some(0.9), Some(2021)),
            doc("doc3", Some(0.9), Some(2019)),
        ];
        sort_by_relevance(&mut docs);
        let titles: Vec<_> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["doc2", "doc3", "doc1"]);
    }

    #[test]
    fn test_missing_score_sorts_last() {
        let mut docs = vec![doc("none", None, Some(2024)), doc("low", Some(0.0), None)];
        sort_by_relevance(&mut docs);
        assert_eq!(docs[0].title, "low");
    }

    #[test]
    fn test_reference_to_ranked_doc_synthesizes_url() {
        let reference = Reference {
            pmid: Some("123".to_string()),
            title: "Trial".to_string(),
            source: Some("NEJM".to_string()),
            ..Default::default()
        };
        let doc = RankedDoc::from(&reference);
        assert_eq!(doc.url.as_deref(), Some("https://pubmed.ncbi.nlm.nih.gov/123/"));
        assert_eq!(doc.journal.as_deref(), Some("NEJM"));
    }

    #[test]
    fn test_snippet_respects_char_boundaries() {
        let text = "é".repeat(400);
        assert_eq!(snippet(&text).chars().count(), EVIDENCE_SNIPPET_CHARS);
    }

    #[test]
    fn test_reference_validity() {
        assert!(!Reference::default().is_valid());
        let only_pmid = Reference {
            pmid: Some("9".to_string()),
            ..Default::default()
        };
        assert!(only_pmid.is_valid());
    }
}
