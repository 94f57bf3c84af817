//! Shared session state machine.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use msgr_protocol::{SessionHealth, SessionState};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::login::{self, LoginSurface, PostLogin};
use crate::config::{Config, Credentials, Timeouts};
use crate::driver::{AutomationContext, Driver, DriverError, FetchRequest, FetchResponse, Scope};
use crate::error::{Error, Result};
use crate::landmarks::Landmarks;

struct SessionCell {
	state: SessionState,
	/// Bumped on every successful authentication.
	generation: u64,
	context: Option<Arc<dyn AutomationContext>>,
}

/// Last completed authentication attempt, guarded by the transition lock.
#[derive(Default)]
struct AttemptRecord {
	attempt: u64,
	outcome: Option<Result<()>>,
}

/// Owns the single authenticated browser context.
///
/// Callers never see the context itself; they get [`ScopedContext`]s
/// (isolated pages sharing its cookies) and raw [`SessionManager::fetch`].
/// Authentication attempts are serialized by one transition lock, and a
/// caller arriving while an attempt is in flight waits for it and shares
/// its outcome.
pub struct SessionManager {
	driver: Arc<dyn Driver>,
	landmarks: Arc<Landmarks>,
	credentials: Credentials,
	timeouts: Timeouts,
	cell: RwLock<SessionCell>,
	transition: Mutex<AttemptRecord>,
	completed_attempts: AtomicU64,
}

/// An isolated page from the shared session, tagged with the generation it came from.
///
/// Dropping it without [`ScopedContext::close`] (a cancelled request, for
/// instance) still closes the page from a spawned task.
pub struct ScopedContext {
	scope: Arc<dyn Scope>,
	generation: u64,
	closed: bool,
}

impl ScopedContext {
	fn new(scope: Box<dyn Scope>, generation: u64) -> Self {
		Self {
			scope: Arc::from(scope),
			generation,
			closed: false,
		}
	}

	pub fn scope(&self) -> &dyn Scope {
		self.scope.as_ref()
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Closes the underlying page. Failures are logged, never returned.
	pub async fn close(mut self) {
		close_scope(self.scope.as_ref(), self.generation).await;
		self.closed = true;
	}
}

impl Drop for ScopedContext {
	fn drop(&mut self) {
		if self.closed {
			return;
		}
		let scope = Arc::clone(&self.scope);
		let generation = self.generation;
		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				debug!(target = "msgr.session", generation, "scope dropped before close, closing in background");
				handle.spawn(async move { close_scope(scope.as_ref(), generation).await });
			}
			Err(_) => warn!(target = "msgr.session", generation, "scope dropped outside a runtime, page left open"),
		}
	}
}

async fn close_scope(scope: &dyn Scope, generation: u64) {
	if let Err(err) = scope.close().await {
		debug!(target = "msgr.session", generation, error = %err, "scope close failed");
	}
}

impl SessionManager {
	pub fn new(driver: Arc<dyn Driver>, landmarks: Arc<Landmarks>, credentials: Credentials, timeouts: Timeouts) -> Self {
		Self {
			driver,
			landmarks,
			credentials,
			timeouts,
			cell: RwLock::new(SessionCell {
				state: SessionState::Uninitialized,
				generation: 0,
				context: None,
			}),
			transition: Mutex::new(AttemptRecord::default()),
			completed_attempts: AtomicU64::new(0),
		}
	}

	pub fn from_config(driver: Arc<dyn Driver>, config: &Config) -> Self {
		Self::new(
			driver,
			Arc::new(Landmarks::from_config(config)),
			config.credentials.clone(),
			config.timeouts.clone(),
		)
	}

	pub fn state(&self) -> SessionState {
		self.cell.read().state
	}

	pub fn generation(&self) -> u64 {
		self.cell.read().generation
	}

	pub fn health(&self) -> SessionHealth {
		SessionHealth::from(self.state())
	}

	/// Brings the session to Ready, logging in when needed.
	///
	/// Idempotent and safe to call concurrently: at most one attempt runs,
	/// and callers that queued behind it receive its outcome.
	pub async fn ensure_ready(&self) -> Result<()> {
		if self.state() == SessionState::Ready {
			return Ok(());
		}

		let observed = self.completed_attempts.load(Ordering::SeqCst);
		let mut record = self.transition.lock().await;

		if record.attempt != observed {
			if let Some(Err(err)) = &record.outcome {
				return Err(err.clone());
			}
		}
		if self.state() == SessionState::Ready {
			return Ok(());
		}

		let outcome = self.authenticate().await;
		record.attempt += 1;
		record.outcome = Some(outcome.clone());
		self.completed_attempts.store(record.attempt, Ordering::SeqCst);
		outcome
	}

	/// Opens an isolated page on the Ready session.
	pub async fn new_scoped_context(&self) -> Result<ScopedContext> {
		let (context, generation) = self.ready_context()?;
		match context.open_scope().await {
			Ok(scope) => Ok(ScopedContext::new(scope, generation)),
			Err(err) if err.is_auth_loss() => {
				self.mark_expired(generation, &err.to_string());
				Err(Error::AuthLost(err.to_string()))
			}
			Err(err) => Err(Error::DriverUnavailable(err.to_string())),
		}
	}

	/// Raw HTTP request through the authenticated context.
	///
	/// A 401/403 response or a closed context expires the session and
	/// yields [`Error::AuthLost`]; other statuses are returned as-is.
	pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
		let (context, generation) = self.ready_context()?;
		let url = request.url.clone();
		match context.fetch(request).await {
			Ok(response) if response.is_auth_failure() => {
				let reason = format!("{url} returned {}", response.status);
				self.mark_expired(generation, &reason);
				Err(Error::AuthLost(reason))
			}
			Ok(response) => Ok(response),
			Err(err) if err.is_auth_loss() => {
				self.mark_expired(generation, &err.to_string());
				Err(Error::AuthLost(err.to_string()))
			}
			Err(DriverError::Timeout { what, ms }) => Err(Error::Upstream {
				status: 0,
				message: format!("timeout after {ms}ms: {what}"),
			}),
			Err(err) => Err(Error::DriverUnavailable(err.to_string())),
		}
	}

	/// Moves Ready to Expired if `generation` is still current.
	///
	/// Returns whether the state changed. Reports from scopes of an older
	/// generation are ignored, so they cannot invalidate a newer login.
	pub fn mark_expired(&self, generation: u64, reason: &str) -> bool {
		let mut cell = self.cell.write();
		if cell.state != SessionState::Ready || cell.generation != generation {
			debug!(
				target = "msgr.session",
				generation,
				current = cell.generation,
				state = %cell.state,
				"ignoring stale expiry report"
			);
			return false;
		}
		cell.state = SessionState::Expired;
		warn!(target = "msgr.session", generation, reason, "session expired");
		true
	}

	/// Closes the context and returns to Uninitialized. Idempotent.
	pub async fn teardown(&self) {
		let _record = self.transition.lock().await;
		self.discard_context().await;
		self.set_state(SessionState::Uninitialized);
	}

	fn ready_context(&self) -> Result<(Arc<dyn AutomationContext>, u64)> {
		let cell = self.cell.read();
		match (&cell.context, cell.state) {
			(Some(context), SessionState::Ready) => Ok((Arc::clone(context), cell.generation)),
			(_, state) => Err(Error::SessionNotReady { state }),
		}
	}

	fn set_state(&self, to: SessionState) {
		let from = std::mem::replace(&mut self.cell.write().state, to);
		if from != to {
			info!(target = "msgr.session", %from, %to, "session state changed");
		}
	}

	async fn discard_context(&self) {
		let context = self.cell.write().context.take();
		if let Some(context) = context {
			if let Err(err) = context.close().await {
				warn!(target = "msgr.session", error = %err, "closing previous context failed");
			}
		}
	}

	async fn authenticate(&self) -> Result<()> {
		self.discard_context().await;
		self.set_state(SessionState::Authenticating);

		let context = match self.driver.launch().await {
			Ok(context) => context,
			Err(err) => {
				self.set_state(SessionState::Failed);
				return Err(Error::DriverUnavailable(err.to_string()));
			}
		};
		self.cell.write().context = Some(Arc::clone(&context));

		match self.login(context.as_ref()).await {
			Ok(()) => {
				let generation = {
					let mut cell = self.cell.write();
					cell.generation += 1;
					cell.generation
				};
				self.set_state(SessionState::Ready);
				info!(target = "msgr.session", generation, "session ready");
				Ok(())
			}
			Err(err) => {
				warn!(target = "msgr.session", code = %err.code(), error = %err, "login failed");
				self.set_state(SessionState::Failed);
				Err(err)
			}
		}
	}

	async fn login(&self, context: &dyn AutomationContext) -> Result<()> {
		let scope = context.open_scope().await.map_err(|err| Error::DriverUnavailable(err.to_string()))?;
		let scoped = ScopedContext::new(scope, self.generation());
		let outcome = self.run_login(scoped.scope()).await;
		scoped.close().await;
		outcome
	}

	async fn run_login(&self, scope: &dyn Scope) -> Result<()> {
		let landmarks = self.landmarks.as_ref();
		let timeouts = &self.timeouts;
		let poll = timeouts.poll_interval();

		scope
			.navigate(&landmarks.login_url(), timeouts.navigation())
			.await
			.map_err(login_error)?;

		match login::detect_surface(scope, landmarks, timeouts.login(), poll)
			.await
			.map_err(login_error)?
		{
			LoginSurface::AlreadyAuthenticated => {
				info!(target = "msgr.session", "existing authentication reused");
				return Ok(());
			}
			LoginSurface::Indeterminate => {
				return Err(Error::LoginFailed(format!(
					"neither the login form nor the authenticated landmark appeared within {}ms",
					timeouts.login_ms
				)));
			}
			LoginSurface::FormPresented => {}
		}

		if !self.credentials.is_complete() {
			return Err(Error::LoginFailed("credentials are not configured".into()));
		}
		login::submit_credentials(scope, landmarks, &self.credentials)
			.await
			.map_err(login_error)?;

		let outcome = login::await_post_login(scope, landmarks, timeouts.login(), poll)
			.await
			.map_err(login_error)?;
		match outcome {
			PostLogin::Authenticated => Ok(()),
			PostLogin::Rejected(reason) => Err(Error::LoginFailed(reason)),
			PostLogin::StepUpRequired => self.await_step_up(scope).await,
			// Without a prompt selector the only sign of step-up is silence.
			PostLogin::TimedOut if landmarks.step_up_prompt().is_none() => self.await_step_up(scope).await,
			PostLogin::TimedOut => Err(Error::LoginFailed(format!(
				"authenticated landmark did not appear within {}ms",
				timeouts.login_ms
			))),
		}
	}

	async fn await_step_up(&self, scope: &dyn Scope) -> Result<()> {
		self.set_state(SessionState::AwaitingStepUp);
		info!(
			target = "msgr.session",
			timeout_ms = self.timeouts.step_up_ms,
			"waiting for out-of-band confirmation"
		);
		let confirmed = login::await_landmark(
			scope,
			self.landmarks.authenticated_landmark(),
			self.timeouts.step_up(),
			self.timeouts.poll_interval(),
		)
		.await
		.map_err(login_error)?;

		if confirmed {
			Ok(())
		} else {
			Err(Error::StepUpTimeout {
				ms: self.timeouts.step_up_ms,
			})
		}
	}
}

fn login_error(err: DriverError) -> Error {
	match err {
		DriverError::ContextClosed(_) | DriverError::Unavailable(_) => Error::DriverUnavailable(err.to_string()),
		other => Error::LoginFailed(other.to_string()),
	}
}
