//! Conversation-list snapshots: fetch, parse and store.

mod engine;
mod parse;
mod store;

pub use engine::SnapshotEngine;
pub use parse::{ConversationPage, parse_conversation_page};
pub use store::SnapshotStore;
