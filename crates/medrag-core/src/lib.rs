//! Core domain for the MedRAG chat client.
//!
//! This crate holds the canonical model shared by every layer, the single
//! normalization boundary that folds backend payloads into it, and the traits
//! through which the application layer reaches the network and local storage.

pub mod error;
pub mod normalize;
pub mod session;
pub mod state;

// Re-export common error type
pub use error::{MedragError, Result};
