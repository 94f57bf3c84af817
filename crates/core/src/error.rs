//! Error taxonomy for session, dispatch and snapshot operations.

use msgr_protocol::{ErrorBody, ErrorCode, SessionState};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Typed failure surfaced by every public operation.
///
/// Errors are `Clone` so that every caller waiting on one login attempt
/// observes the same outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
	#[error("session is not ready (state: {state})")]
	SessionNotReady { state: SessionState },

	#[error("login failed: {0}")]
	LoginFailed(String),

	#[error("step-up confirmation not completed within {ms}ms")]
	StepUpTimeout { ms: u64 },

	#[error("automation driver unavailable: {0}")]
	DriverUnavailable(String),

	#[error("authentication lost: {0}")]
	AuthLost(String),

	#[error("message input '{selector}' not interactable within {ms}ms")]
	InputNotFound { selector: String, ms: u64 },

	#[error("UI step failed: {0}")]
	UiStepFailed(String),

	#[error("malformed response: {0}")]
	MalformedResponse(String),

	#[error("upstream returned status {status}: {message}")]
	Upstream { status: u16, message: String },

	#[error("snapshot not found: {0}")]
	NotFound(String),

	#[error("snapshot store is empty")]
	Empty,

	#[error("invalid payload: {0}")]
	InvalidPayload(String),

	#[error("configuration error: {0}")]
	Config(String),
}

impl Error {
	/// Stable machine-readable kind.
	pub fn code(&self) -> ErrorCode {
		match self {
			Error::SessionNotReady { .. } => ErrorCode::SessionNotReady,
			Error::LoginFailed(_) => ErrorCode::LoginFailed,
			Error::StepUpTimeout { .. } => ErrorCode::StepUpTimeout,
			Error::DriverUnavailable(_) => ErrorCode::DriverUnavailable,
			Error::AuthLost(_) => ErrorCode::AuthLost,
			Error::InputNotFound { .. } => ErrorCode::InputNotFound,
			Error::UiStepFailed(_) => ErrorCode::UiStepFailed,
			Error::MalformedResponse(_) => ErrorCode::MalformedResponse,
			Error::Upstream { .. } => ErrorCode::UpstreamError,
			Error::NotFound(_) => ErrorCode::NotFound,
			Error::Empty => ErrorCode::Empty,
			Error::InvalidPayload(_) => ErrorCode::InvalidPayload,
			Error::Config(_) => ErrorCode::ConfigError,
		}
	}

	/// Converts into the wire error envelope.
	pub fn to_body(&self) -> ErrorBody {
		ErrorBody {
			code: self.code(),
			message: self.to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn body_carries_code_and_message() {
		let body = Error::InputNotFound {
			selector: "#composer".into(),
			ms: 10_000,
		}
		.to_body();
		assert_eq!(body.code, ErrorCode::InputNotFound);
		assert_eq!(body.message, "message input '#composer' not interactable within 10000ms");
	}

	#[test]
	fn empty_and_not_found_are_distinct() {
		assert_ne!(Error::Empty.code(), Error::NotFound("x".into()).code());
	}
}
