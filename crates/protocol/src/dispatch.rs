//! Outbound message dispatch requests and results.

use serde::{Deserialize, Serialize};

/// What the message carries besides its text body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
	/// Plain text message.
	#[default]
	Text,
	/// Text plus an image attachment.
	Image,
	/// Text plus a generic file attachment.
	File,
}

impl AttachmentKind {
	/// Returns true when this kind requires an attachment reference.
	pub fn requires_reference(self) -> bool {
		!matches!(self, Self::Text)
	}
}

impl std::fmt::Display for AttachmentKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Text => f.write_str("text"),
			Self::Image => f.write_str("image"),
			Self::File => f.write_str("file"),
		}
	}
}

/// Message body plus optional attachment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
	/// Text typed into the conversation input.
	#[serde(default)]
	pub body: String,
	/// Attachment discriminator.
	#[serde(default)]
	pub kind: AttachmentKind,
	/// URL or filename of the attachment (required for image/file).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reference: Option<String>,
}

impl MessagePayload {
	/// Creates a text-only payload.
	pub fn text(body: impl Into<String>) -> Self {
		Self {
			body: body.into(),
			kind: AttachmentKind::Text,
			reference: None,
		}
	}

	/// Creates a payload with an attachment of `kind`.
	pub fn with_attachment(body: impl Into<String>, kind: AttachmentKind, reference: impl Into<String>) -> Self {
		Self {
			body: body.into(),
			kind,
			reference: Some(reference.into()),
		}
	}
}

/// One inbound send call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
	/// Opaque conversation identifier.
	pub target: String,
	/// What to send.
	#[serde(flatten)]
	pub payload: MessagePayload,
}

impl DispatchRequest {
	pub fn new(target: impl Into<String>, payload: MessagePayload) -> Self {
		Self {
			target: target.into(),
			payload,
		}
	}
}

/// Machine-readable reason a dispatch did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
	/// The session could not be made ready.
	SessionUnavailable,
	/// Authentication was lost while the dispatch was running.
	AuthLost,
	/// The message input never became interactable.
	InputNotFound,
	/// Some other UI step failed.
	UiStepFailed,
	/// The request violated payload invariants.
	InvalidPayload,
}

impl std::fmt::Display for FailureReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			Self::SessionUnavailable => "SESSION_UNAVAILABLE",
			Self::AuthLost => "AUTH_LOST",
			Self::InputNotFound => "INPUT_NOT_FOUND",
			Self::UiStepFailed => "UI_STEP_FAILED",
			Self::InvalidPayload => "INVALID_PAYLOAD",
		};
		f.write_str(name)
	}
}

/// Outcome of a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
	pub succeeded: bool,
	/// Generated message id (only on success).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	/// Present iff `succeeded` is false.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub failure_reason: Option<FailureReason>,
	/// Human-readable failure description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	/// Unix epoch milliseconds.
	pub completed_at: u64,
}

impl DispatchResult {
	pub fn success(id: String, completed_at: u64) -> Self {
		Self {
			succeeded: true,
			id: Some(id),
			failure_reason: None,
			message: None,
			completed_at,
		}
	}

	pub fn failure(reason: FailureReason, message: impl Into<String>, completed_at: u64) -> Self {
		Self {
			succeeded: false,
			id: None,
			failure_reason: Some(reason),
			message: Some(message.into()),
			completed_at,
		}
	}
}
