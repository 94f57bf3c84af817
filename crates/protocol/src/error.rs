//! Stable error codes surfaced across the service boundary.

use serde::{Deserialize, Serialize};

/// Machine-readable error kind attached to every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// A scoped context was requested while the session was not ready
	SessionNotReady,
	/// Credential login did not reach the authenticated landmark
	LoginFailed,
	/// Out-of-band confirmation window elapsed
	StepUpTimeout,
	/// Browser could not be launched or reached
	DriverUnavailable,
	/// Authentication lost mid-operation
	AuthLost,
	/// Message input never became interactable
	InputNotFound,
	/// A UI step failed
	UiStepFailed,
	/// Remote payload lacked required fields
	MalformedResponse,
	/// Remote endpoint returned an unexpected status
	UpstreamError,
	/// Named snapshot does not exist
	NotFound,
	/// Snapshot store holds no entries
	Empty,
	/// Request violated payload invariants
	InvalidPayload,
	/// Configuration could not be loaded
	ConfigError,
	/// Unknown/internal error
	InternalError,
}

impl ErrorCode {
	pub fn as_str(self) -> &'static str {
		match self {
			ErrorCode::SessionNotReady => "SESSION_NOT_READY",
			ErrorCode::LoginFailed => "LOGIN_FAILED",
			ErrorCode::StepUpTimeout => "STEP_UP_TIMEOUT",
			ErrorCode::DriverUnavailable => "DRIVER_UNAVAILABLE",
			ErrorCode::AuthLost => "AUTH_LOST",
			ErrorCode::InputNotFound => "INPUT_NOT_FOUND",
			ErrorCode::UiStepFailed => "UI_STEP_FAILED",
			ErrorCode::MalformedResponse => "MALFORMED_RESPONSE",
			ErrorCode::UpstreamError => "UPSTREAM_ERROR",
			ErrorCode::NotFound => "NOT_FOUND",
			ErrorCode::Empty => "EMPTY",
			ErrorCode::InvalidPayload => "INVALID_PAYLOAD",
			ErrorCode::ConfigError => "CONFIG_ERROR",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		}
	}
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error envelope returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	pub code: ErrorCode,
	pub message: String,
}
