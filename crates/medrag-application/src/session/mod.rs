//! Session application services.
//!
//! This module contains the client-side session state: the local cache, the
//! active-session selector, the synchronization engine that talks to the
//! backend, and the right-pane view model.

mod right_pane;
mod selector;
mod store;
mod sync;

pub use right_pane::{build_right_pane, dedup_results};
pub use selector::ActiveSessionSelector;
pub use store::LocalStore;
pub use sync::{SendReceipt, SendState, SessionSync, merge_reply};
