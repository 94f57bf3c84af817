//! Session lifecycle states reported to callers.

use serde::{Deserialize, Serialize};

/// Lifecycle state of the single authenticated automation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
	/// No context has been launched yet, or the session was torn down.
	#[default]
	Uninitialized,
	/// A login attempt is in flight.
	Authenticating,
	/// Credentials were accepted and the site waits for out-of-band confirmation.
	AwaitingStepUp,
	/// The session is authenticated and hands out scoped contexts.
	Ready,
	/// A dependent operation observed the authentication being lost.
	Expired,
	/// The last login attempt failed.
	Failed,
}

impl SessionState {
	/// Returns true for states that require a fresh login before use.
	pub fn needs_login(self) -> bool {
		matches!(self, Self::Uninitialized | Self::Expired | Self::Failed)
	}
}

impl std::fmt::Display for SessionState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			Self::Uninitialized => "uninitialized",
			Self::Authenticating => "authenticating",
			Self::AwaitingStepUp => "awaiting_step_up",
			Self::Ready => "ready",
			Self::Expired => "expired",
			Self::Failed => "failed",
		};
		f.write_str(name)
	}
}

/// Health view consumed by liveness endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHealth {
	/// Whether scoped contexts can be issued right now.
	pub ready: bool,
	/// Current lifecycle state.
	pub state: SessionState,
}

impl From<SessionState> for SessionHealth {
	fn from(state: SessionState) -> Self {
		Self {
			ready: state == SessionState::Ready,
			state,
		}
	}
}
