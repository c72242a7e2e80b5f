//! Persisted client state.

pub mod memory;
pub mod model;
pub mod repository;

pub use memory::MemoryStateRepository;
pub use model::AppState;
pub use repository::StateRepository;
