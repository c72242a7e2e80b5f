//! Session domain module.
//!
//! This module contains the canonical session model, the types attached to
//! answers (references and the right-pane aggregate) and the backend API trait.
//!
//! # Module Structure
//!
//! - `model`: `Session` and `SessionSummary`
//! - `message`: `MessageRole`, `Message`
//! - `reference`: `Reference`, `RankedDoc`, `RightPaneData` and friends
//! - `api`: `SessionApi` trait for the REST backend

mod api;
mod message;
mod model;
mod reference;

// Re-export public API
pub use api::{AskRequest, SessionApi};
pub use message::{Message, MessageRole};
pub use model::{DEFAULT_SESSION_TITLE, Session, SessionSummary, UNTITLED_SESSION_TITLE};
pub use reference::{
    BooleanItem, EVIDENCE_LIMIT, EVIDENCE_SNIPPET_CHARS, EvidenceItem, Overview, PUBMED_URL_TEMPLATE,
    PlanLite, RankedDoc, Reference, RightPaneData, pubmed_url, snippet, sort_by_relevance,
};
