//! Message dispatch over scoped sub-contexts.

use std::path::PathBuf;
use std::sync::Arc;

use msgr_protocol::{AttachmentKind, DispatchRequest, DispatchResult, FailureReason, MessagePayload};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Timeouts;
use crate::driver::{DriverError, Scope};
use crate::error::Error;
use crate::ids::{IdGenerator, now_ms};
use crate::landmarks::Landmarks;
use crate::session::SessionManager;

/// Sends messages, one isolated page per request.
///
/// Every dispatch runs its UI steps strictly in order on its own page,
/// and the page is closed on every path.
pub struct DispatchEngine {
	session: Arc<SessionManager>,
	landmarks: Arc<Landmarks>,
	timeouts: Timeouts,
	ids: IdGenerator,
}

/// Where a dispatch step stopped.
#[derive(Debug)]
enum StepError {
	Driver(DriverError),
	InputNotFound { selector: String, ms: u64 },
}

impl From<DriverError> for StepError {
	fn from(err: DriverError) -> Self {
		StepError::Driver(err)
	}
}

/// Attachment source after classification.
enum Attachment {
	Remote(Url),
	Local(PathBuf),
}

impl DispatchEngine {
	pub fn new(session: Arc<SessionManager>, landmarks: Arc<Landmarks>, timeouts: Timeouts) -> Self {
		Self {
			session,
			landmarks,
			timeouts,
			ids: IdGenerator::new("msg"),
		}
	}

	pub async fn dispatch(&self, request: &DispatchRequest) -> DispatchResult {
		if let Err(err) = validate(request) {
			debug!(target = "msgr.dispatch", error = %err, "rejected payload");
			return failure(FailureReason::InvalidPayload, &err);
		}

		if let Err(err) = self.session.ensure_ready().await {
			warn!(target = "msgr.dispatch", target_id = %request.target, error = %err, "session unavailable");
			return failure(FailureReason::SessionUnavailable, &err);
		}

		let scoped = match self.session.new_scoped_context().await {
			Ok(scoped) => scoped,
			Err(err @ Error::AuthLost(_)) => return failure(FailureReason::AuthLost, &err),
			Err(err) => return failure(FailureReason::SessionUnavailable, &err),
		};
		let generation = scoped.generation();

		let outcome = self.run_steps(scoped.scope(), request).await;
		scoped.close().await;

		match outcome {
			Ok(()) => {
				let id = self.ids.next();
				info!(
					target = "msgr.dispatch",
					target_id = %request.target,
					kind = %request.payload.kind,
					id = %id,
					"message sent"
				);
				DispatchResult::success(id, now_ms())
			}
			Err(err) => {
				let (reason, err) = self.classify(err, generation);
				warn!(
					target = "msgr.dispatch",
					target_id = %request.target,
					reason = %reason,
					error = %err,
					"dispatch failed"
				);
				failure(reason, &err)
			}
		}
	}

	async fn run_steps(&self, scope: &dyn Scope, request: &DispatchRequest) -> Result<(), StepError> {
		let landmarks = self.landmarks.as_ref();
		let payload = &request.payload;

		scope
			.navigate(&landmarks.conversation_url(&request.target), self.timeouts.navigation())
			.await?;

		let input = landmarks.message_input();
		if let Err(err) = scope.wait_for(input, self.timeouts.input()).await {
			if !err.is_timeout() {
				return Err(err.into());
			}
			if scope.is_visible(landmarks.login_form()).await.unwrap_or(false) {
				return Err(DriverError::Unauthenticated("conversation page redirected to the login form".into()).into());
			}
			return Err(StepError::InputNotFound {
				selector: input.to_string(),
				ms: self.timeouts.input_ms,
			});
		}

		scope.fill(input, &payload.body).await?;

		if payload.kind.requires_reference() {
			self.attach(scope, payload).await?;
		}

		scope.click(landmarks.send_action()).await?;
		sleep(self.timeouts.settle()).await;
		Ok(())
	}

	async fn attach(&self, scope: &dyn Scope, payload: &MessagePayload) -> Result<(), DriverError> {
		let landmarks = self.landmarks.as_ref();
		let (Some(option), Some(reference)) = (landmarks.attach_option(payload.kind), payload.reference.as_deref()) else {
			return Err(DriverError::Failed(format!("{} attachment has no reference", payload.kind)));
		};

		scope.click(landmarks.attach_menu()).await?;
		scope.click(option).await?;

		match classify_reference(reference) {
			Attachment::Remote(url) => {
				scope.fill(landmarks.attachment_url_input(), url.as_str()).await?;
				scope.click(landmarks.attachment_confirm()).await?;
			}
			Attachment::Local(path) => {
				scope.set_input_files(landmarks.attachment_file_input(), &[path]).await?;
			}
		}
		debug!(target = "msgr.dispatch", kind = %payload.kind, "attachment provided");
		Ok(())
	}

	fn classify(&self, err: StepError, generation: u64) -> (FailureReason, Error) {
		match err {
			StepError::InputNotFound { selector, ms } => (FailureReason::InputNotFound, Error::InputNotFound { selector, ms }),
			StepError::Driver(err) if err.is_auth_loss() => {
				self.session.mark_expired(generation, &err.to_string());
				(FailureReason::AuthLost, Error::AuthLost(err.to_string()))
			}
			StepError::Driver(err) => (FailureReason::UiStepFailed, Error::UiStepFailed(err.to_string())),
		}
	}
}

/// Checks request invariants before any driver call.
pub fn validate(request: &DispatchRequest) -> Result<(), Error> {
	if request.target.trim().is_empty() {
		return Err(Error::InvalidPayload("target must not be empty".into()));
	}
	let payload = &request.payload;
	match (payload.kind, payload.reference.as_deref().map(str::trim)) {
		(AttachmentKind::Text, _) => {
			if payload.body.trim().is_empty() {
				return Err(Error::InvalidPayload("text message body must not be empty".into()));
			}
		}
		(kind, None | Some("")) => {
			return Err(Error::InvalidPayload(format!("{kind} attachment requires a reference")));
		}
		(_, Some(reference)) => {
			if let Attachment::Local(path) = classify_reference(reference) {
				if !path.is_file() {
					return Err(Error::InvalidPayload(format!(
						"attachment file not found: {}",
						path.display()
					)));
				}
			}
		}
	}
	Ok(())
}

/// `http(s)` URLs are uploaded by link; `file:` URLs and bare paths from disk.
fn classify_reference(reference: &str) -> Attachment {
	match Url::parse(reference) {
		Ok(url) if matches!(url.scheme(), "http" | "https") => Attachment::Remote(url),
		Ok(url) if url.scheme() == "file" => match url.to_file_path() {
			Ok(path) => Attachment::Local(path),
			Err(()) => Attachment::Local(PathBuf::from(reference)),
		},
		_ => Attachment::Local(PathBuf::from(reference)),
	}
}

fn failure(reason: FailureReason, err: &Error) -> DispatchResult {
	DispatchResult::failure(reason, err.to_string(), now_ms())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_empty_target_and_missing_reference() {
		let err = validate(&DispatchRequest::new(" ", MessagePayload::text("hi"))).unwrap_err();
		assert!(matches!(err, Error::InvalidPayload(_)));

		let request = DispatchRequest::new(
			"c1",
			MessagePayload {
				body: "look".into(),
				kind: AttachmentKind::Image,
				reference: None,
			},
		);
		assert!(matches!(validate(&request), Err(Error::InvalidPayload(_))));
	}

	#[test]
	fn text_requires_body() {
		let err = validate(&DispatchRequest::new("c1", MessagePayload::text(""))).unwrap_err();
		assert!(matches!(err, Error::InvalidPayload(_)));
		validate(&DispatchRequest::new("c1", MessagePayload::text("hello"))).unwrap();
	}

	#[test]
	fn remote_references_skip_file_check() {
		let request = DispatchRequest::new(
			"c1",
			MessagePayload::with_attachment("", AttachmentKind::Image, "https://cdn.example.com/cat.png"),
		);
		validate(&request).unwrap();
	}

	#[test]
	fn local_references_must_exist() {
		let missing = DispatchRequest::new(
			"c1",
			MessagePayload::with_attachment("", AttachmentKind::File, "/definitely/not/here.pdf"),
		);
		assert!(matches!(validate(&missing), Err(Error::InvalidPayload(_))));

		let file = tempfile::NamedTempFile::new().unwrap();
		let present = DispatchRequest::new(
			"c1",
			MessagePayload::with_attachment("report", AttachmentKind::File, file.path().to_string_lossy()),
		);
		validate(&present).unwrap();
	}

	#[test]
	fn reference_classification() {
		assert!(matches!(
			classify_reference("https://example.com/a.png"),
			Attachment::Remote(_)
		));
		match classify_reference("file:///tmp/a.png") {
			Attachment::Local(path) => assert_eq!(path, PathBuf::from("/tmp/a.png")),
			Attachment::Remote(url) => panic!("file url classified as remote: {url}"),
		}
		assert!(matches!(classify_reference("photos/a.png"), Attachment::Local(_)));
	}
}
