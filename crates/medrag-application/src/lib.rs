//! Application layer for the MedRAG client.
//!
//! Coordinates the local session cache with the backend through the
//! traits defined in `medrag-core`.

pub mod session;

pub use session::{ActiveSessionSelector, LocalStore, SendReceipt, SendState, SessionSync};
