//! Conversation-list snapshots.

use serde::{Deserialize, Serialize};

/// Normalized summary of one conversation in the remote list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
	/// Stable conversation identifier (numeric ids are stringified).
	pub conversation_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	#[serde(default)]
	pub unread_count: u32,
	#[serde(default)]
	pub mention_count: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_message_preview: Option<String>,
	/// Unix epoch milliseconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_message_at: Option<i64>,
	/// Unix epoch milliseconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub updated_at: Option<i64>,
	#[serde(default)]
	pub is_friend: bool,
	#[serde(default)]
	pub is_blocked: bool,
	#[serde(default)]
	pub is_starred: bool,
}

/// One immutable capture of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
	pub id: String,
	pub items: Vec<ConversationSummary>,
	/// Unix epoch milliseconds.
	pub saved_at: u64,
	pub total_count: usize,
}

impl Snapshot {
	/// Builds a snapshot, deriving `total_count` from `items`.
	pub fn new(id: String, items: Vec<ConversationSummary>, saved_at: u64) -> Self {
		let total_count = items.len();
		Self {
			id,
			items,
			saved_at,
			total_count,
		}
	}
}

/// Result of a fetch-and-save call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotOutcome {
	/// Id of the stored snapshot.
	pub id: String,
	pub items: Vec<ConversationSummary>,
	/// The remote list had more entries than one page returned.
	pub has_more: bool,
}

/// Answer to a snapshot lookup: one snapshot by id, or all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SnapshotQuery {
	One(Snapshot),
	All(Vec<Snapshot>),
}
