//! Infrastructure adapters for the MedRAG client.
//!
//! Implements the core traits against the outside world: the REST backend
//! over reqwest and the persisted client state on the local file system.

pub mod config;
pub mod http_session_api;
pub mod paths;
pub mod state_repository;
pub mod storage;

pub use crate::config::ClientConfig;
pub use crate::http_session_api::HttpSessionApi;
pub use crate::paths::MedragPaths;
pub use crate::state_repository::FileStateRepository;
