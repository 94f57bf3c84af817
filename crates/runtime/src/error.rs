//! Error types for the CDP runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a browser over CDP.
#[derive(Debug, Error)]
pub enum Error {
	/// No Chromium-family executable could be located.
	#[error("Chromium executable not found. Install Chrome/Chromium or set browser.executable")]
	BrowserNotFound,

	/// The browser process failed to start or exited early.
	#[error("Failed to launch browser: {0}")]
	LaunchFailed(String),

	/// Failed to reach the DevTools endpoint.
	#[error("Failed to connect to DevTools endpoint: {0}")]
	ConnectionFailed(String),

	/// WebSocket-level error.
	#[error("Transport error: {0}")]
	TransportError(String),

	/// CDP returned an error payload for a command.
	#[error("Protocol error ({code}): {message}")]
	Protocol { code: i64, message: String },

	/// The target (page, session or browser) is gone.
	#[error("Target closed: {0}")]
	TargetClosed(String),

	/// Connection closed while requests were pending.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// Timeout waiting for an operation.
	#[error("Timeout after {ms}ms: {what}")]
	Timeout { what: String, ms: u64 },

	/// Navigation rejected by the browser (DNS, TLS, aborted...).
	#[error("Navigation to '{url}' failed: {reason}")]
	Navigation { url: String, reason: String },

	/// No element matched the selector.
	#[error("Element not found: selector '{0}'")]
	ElementNotFound(String),

	/// Script evaluation threw in the page.
	#[error("Evaluation failed: {0}")]
	Evaluation(String),

	/// Outbound HTTP error (endpoint discovery).
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout { .. })
	}

	/// Returns true when the page, session or connection no longer exists.
	pub fn is_target_closed(&self) -> bool {
		matches!(
			self,
			Error::TargetClosed(_) | Error::ChannelClosed | Error::ConnectionFailed(_) | Error::TransportError(_)
		)
	}

	/// Builds an error from a CDP error payload, classifying closed-target messages.
	pub(crate) fn from_protocol(code: i64, message: String) -> Self {
		if is_closed_target_message(&message) {
			Error::TargetClosed(message)
		} else {
			Error::Protocol { code, message }
		}
	}
}

fn is_closed_target_message(message: &str) -> bool {
	const MARKERS: &[&str] = &[
		"Target closed",
		"No target with given id",
		"Session with given id not found",
		"No session with given id",
	];
	MARKERS.iter().any(|marker| message.contains(marker))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn closed_target_messages_are_classified() {
		let err = Error::from_protocol(-32000, "Session with given id not found.".into());
		assert!(err.is_target_closed());

		let err = Error::from_protocol(-32601, "'Page.bogus' wasn't found".into());
		assert!(!err.is_target_closed());
		assert!(matches!(err, Error::Protocol { code: -32601, .. }));
	}

	#[test]
	fn channel_closed_counts_as_target_closed() {
		assert!(Error::ChannelClosed.is_target_closed());
		assert!(!Error::Timeout { what: "x".into(), ms: 1 }.is_target_closed());
	}
}
