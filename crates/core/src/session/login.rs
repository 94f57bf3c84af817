//! Login page probing.
//!
//! Each probe polls visibility of a small set of landmarks until one
//! appears or its window closes. Probes never fail on a missing element;
//! only driver-level errors propagate.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::config::Credentials;
use crate::driver::{DriverResult, Scope};
use crate::landmarks::Landmarks;

/// What the login page showed after navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoginSurface {
	FormPresented,
	AlreadyAuthenticated,
	/// Neither the form nor the authenticated landmark appeared.
	Indeterminate,
}

/// What the page showed after credentials were submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PostLogin {
	Authenticated,
	StepUpRequired,
	Rejected(String),
	TimedOut,
}

pub(crate) async fn detect_surface(
	scope: &dyn Scope,
	landmarks: &Landmarks,
	window: Duration,
	poll: Duration,
) -> DriverResult<LoginSurface> {
	let deadline = Instant::now() + window;
	loop {
		if scope.is_visible(landmarks.authenticated_landmark()).await? {
			return Ok(LoginSurface::AlreadyAuthenticated);
		}
		if scope.is_visible(landmarks.login_form()).await? {
			return Ok(LoginSurface::FormPresented);
		}
		if !pause(deadline, poll).await {
			return Ok(LoginSurface::Indeterminate);
		}
	}
}

pub(crate) async fn submit_credentials(
	scope: &dyn Scope,
	landmarks: &Landmarks,
	credentials: &Credentials,
) -> DriverResult<()> {
	scope.fill(landmarks.username_input(), &credentials.username).await?;
	scope.fill(landmarks.password_input(), &credentials.password).await?;
	scope.click(landmarks.login_submit()).await?;
	debug!(target = "msgr.session", "credentials submitted");
	Ok(())
}

pub(crate) async fn await_post_login(
	scope: &dyn Scope,
	landmarks: &Landmarks,
	window: Duration,
	poll: Duration,
) -> DriverResult<PostLogin> {
	let deadline = Instant::now() + window;
	loop {
		if scope.is_visible(landmarks.authenticated_landmark()).await? {
			return Ok(PostLogin::Authenticated);
		}
		if let Some(selector) = landmarks.login_error() {
			if scope.is_visible(selector).await? {
				let text = scope.read_text(selector).await.unwrap_or_default();
				let reason = match text.trim() {
					"" => "site rejected the credentials".to_string(),
					text => text.to_string(),
				};
				return Ok(PostLogin::Rejected(reason));
			}
		}
		if let Some(selector) = landmarks.step_up_prompt() {
			if scope.is_visible(selector).await? {
				return Ok(PostLogin::StepUpRequired);
			}
		}
		if !pause(deadline, poll).await {
			return Ok(PostLogin::TimedOut);
		}
	}
}

/// Polls for `selector`; `false` when the window closes first.
pub(crate) async fn await_landmark(
	scope: &dyn Scope,
	selector: &str,
	window: Duration,
	poll: Duration,
) -> DriverResult<bool> {
	let deadline = Instant::now() + window;
	loop {
		if scope.is_visible(selector).await? {
			return Ok(true);
		}
		if !pause(deadline, poll).await {
			return Ok(false);
		}
	}
}

/// Sleeps one poll step; `false` once the deadline has passed.
async fn pause(deadline: Instant, poll: Duration) -> bool {
	let now = Instant::now();
	if now >= deadline {
		return false;
	}
	sleep(poll.min(deadline - now)).await;
	true
}
