//! Conversation-list payload parsing.
//!
//! The list endpoint is not under our control, so field names are accepted
//! in the handful of spellings seen in practice and normalized into
//! [`ConversationSummary`].

use msgr_protocol::ConversationSummary;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// One parsed page of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationPage {
	pub items: Vec<ConversationSummary>,
	pub has_more: bool,
}

#[derive(Deserialize)]
struct RawPage {
	#[serde(alias = "items", alias = "chats")]
	conversations: Vec<RawConversation>,
	#[serde(default, alias = "hasMore")]
	has_more: bool,
}

#[derive(Deserialize)]
struct RawConversation {
	#[serde(alias = "conversationId", alias = "conversation_id", alias = "chatId")]
	id: RawId,
	#[serde(default, alias = "name", alias = "displayName")]
	title: Option<String>,
	#[serde(default, alias = "unreadCount")]
	unread_count: Option<u32>,
	#[serde(default, alias = "mentionCount")]
	mention_count: Option<u32>,
	#[serde(default, alias = "lastMessage")]
	last_message: Option<RawLastMessage>,
	#[serde(default, alias = "lastMessagePreview")]
	last_message_preview: Option<String>,
	#[serde(default, alias = "lastMessageAt")]
	last_message_at: Option<i64>,
	#[serde(default, alias = "updatedAt")]
	updated_at: Option<i64>,
	#[serde(default, alias = "isFriend")]
	is_friend: bool,
	#[serde(default, alias = "isBlocked")]
	is_blocked: bool,
	#[serde(default, alias = "isStarred")]
	is_starred: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
	Text(String),
	Number(u64),
}

#[derive(Deserialize)]
struct RawLastMessage {
	#[serde(default, alias = "body")]
	text: Option<String>,
	#[serde(default, alias = "sentAt", alias = "createdAt")]
	sent_at: Option<i64>,
}

/// Parses a list response body.
///
/// Accepts the page object at the top level or under a `data` envelope.
pub fn parse_conversation_page(body: &str) -> Result<ConversationPage> {
	let value: Value =
		serde_json::from_str(body).map_err(|err| Error::MalformedResponse(format!("response is not JSON: {err}")))?;
	let page = match value.get("data") {
		Some(data) if data.is_object() => data,
		_ => &value,
	};
	if !page.is_object() {
		return Err(Error::MalformedResponse("expected a JSON object".into()));
	}

	let raw = RawPage::deserialize(page).map_err(|err| Error::MalformedResponse(err.to_string()))?;
	let items = raw
		.conversations
		.into_iter()
		.enumerate()
		.map(|(index, raw)| summarize(index, raw))
		.collect::<Result<Vec<_>>>()?;

	Ok(ConversationPage {
		items,
		has_more: raw.has_more,
	})
}

fn summarize(index: usize, raw: RawConversation) -> Result<ConversationSummary> {
	let conversation_id = match raw.id {
		RawId::Text(id) => id,
		RawId::Number(id) => id.to_string(),
	};
	if conversation_id.trim().is_empty() {
		return Err(Error::MalformedResponse(format!("conversation {index} has an empty id")));
	}

	let (message_text, message_at) = match raw.last_message {
		Some(message) => (message.text, message.sent_at),
		None => (None, None),
	};

	Ok(ConversationSummary {
		conversation_id,
		title: raw.title.filter(|title| !title.is_empty()),
		unread_count: raw.unread_count.unwrap_or_default(),
		mention_count: raw.mention_count.unwrap_or_default(),
		last_message_preview: raw.last_message_preview.or(message_text),
		last_message_at: raw.last_message_at.or(message_at),
		updated_at: raw.updated_at,
		is_friend: raw.is_friend,
		is_blocked: raw.is_blocked,
		is_starred: raw.is_starred,
	})
}
