//! Payload normalization.
//!
//! The single boundary between the backend's loosely versioned JSON and the
//! canonical model. Every function here is total: missing or mistyped fields
//! degrade to defaults and nothing returns an error. Code downstream of this
//! module never inspects payload shapes again.

mod ask;
mod message;
mod right_pane;
mod session;
pub mod value;

pub use ask::{AskReply, normalize_ask_reply};
pub use message::{normalize_message, normalize_messages, normalize_references};
pub use right_pane::normalize_right_pane;
pub use session::{normalize_session, normalize_session_list};
