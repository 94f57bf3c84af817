//! In-memory driver simulating the remote chat site.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use msgr::config::{Config, Credentials, Selectors};
use msgr::driver::{AutomationContext, Driver, DriverError, DriverResult, FetchRequest, FetchResponse, Scope};
use parking_lot::{Mutex, MutexGuard};
use tokio::time::{Instant, sleep};

pub const BASE_URL: &str = "https://chat.test";

/// Config with short timeouts and credentials set.
pub fn test_config() -> Config {
	let mut config = Config::default();
	config.site.base_url = BASE_URL.into();
	config.credentials = Credentials::new("alice", "s3cret");
	config.timeouts.navigation_ms = 1_000;
	config.timeouts.login_ms = 200;
	config.timeouts.step_up_ms = 300;
	config.timeouts.input_ms = 60;
	config.timeouts.settle_ms = 0;
	config.timeouts.fetch_ms = 1_000;
	config.timeouts.poll_interval_ms = 5;
	config
}

/// How the login page behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
	/// Form shown; submitting lands on the authenticated landmark.
	Form,
	/// The authenticated landmark is already on the login page.
	AlreadyAuthenticated,
	/// Nothing ever renders.
	Blank,
	/// Submitting shows the login error landmark.
	Rejected,
	/// Submitting shows the step-up prompt until confirmed, `None` never confirms.
	StepUp { confirm_after: Option<Duration> },
	/// Like `StepUp`, but no prompt is rendered at all.
	SilentStepUp { confirm_after: Option<Duration> },
}

struct Behaviour {
	login: LoginMode,
	fail_launch: bool,
	launch_delay: Duration,
	/// Selector -> error returned by fill/click/wait_for/set_input_files.
	failures: HashMap<String, DriverError>,
	/// Selectors never rendered on conversation pages.
	hidden: Vec<String>,
	fetch: DriverResult<FetchResponse>,
	/// Conversation pages bounce to the login form.
	logged_out: bool,
	/// `open_scope` reports the context as gone.
	context_gone: bool,
	/// Time a conversation page takes to load.
	conversation_delay: Duration,
}

struct Shared {
	selectors: Selectors,
	login_path: String,
	behaviour: Mutex<Behaviour>,
	submitted_at: Mutex<Option<Instant>>,
	launches: AtomicUsize,
	submits: AtomicUsize,
	contexts_closed: AtomicUsize,
	fetches: Mutex<Vec<FetchRequest>>,
	scopes: Mutex<Vec<Arc<Mutex<Vec<String>>>>>,
	scopes_closed: AtomicUsize,
}

/// Scriptable [`Driver`] with per-scope call logs and counters.
#[derive(Clone)]
pub struct MockDriver {
	shared: Arc<Shared>,
}

impl MockDriver {
	pub fn new(config: &Config) -> Self {
		Self {
			shared: Arc::new(Shared {
				selectors: config.selectors.clone(),
				login_path: config.site.login_path.clone(),
				behaviour: Mutex::new(Behaviour {
					login: LoginMode::Form,
					fail_launch: false,
					launch_delay: Duration::ZERO,
					failures: HashMap::new(),
					hidden: Vec::new(),
					fetch: Ok(FetchResponse {
						status: 200,
						headers: Vec::new(),
						body: r#"{"conversations":[]}"#.into(),
					}),
					logged_out: false,
					context_gone: false,
					conversation_delay: Duration::ZERO,
				}),
				submitted_at: Mutex::new(None),
				launches: AtomicUsize::new(0),
				submits: AtomicUsize::new(0),
				contexts_closed: AtomicUsize::new(0),
				fetches: Mutex::new(Vec::new()),
				scopes: Mutex::new(Vec::new()),
				scopes_closed: AtomicUsize::new(0),
			}),
		}
	}

	fn behaviour(&self) -> MutexGuard<'_, Behaviour> {
		self.shared.behaviour.lock()
	}

	pub fn set_login_mode(&self, mode: LoginMode) {
		self.behaviour().login = mode;
	}

	pub fn set_fail_launch(&self, fail: bool) {
		self.behaviour().fail_launch = fail;
	}

	pub fn set_launch_delay(&self, delay: Duration) {
		self.behaviour().launch_delay = delay;
	}

	pub fn fail_on(&self, selector: &str, error: DriverError) {
		self.behaviour().failures.insert(selector.to_string(), error);
	}

	pub fn hide(&self, selector: &str) {
		self.behaviour().hidden.push(selector.to_string());
	}

	pub fn respond_with(&self, status: u16, body: &str) {
		self.behaviour().fetch = Ok(FetchResponse {
			status,
			headers: Vec::new(),
			body: body.to_string(),
		});
	}

	pub fn fail_fetch(&self, error: DriverError) {
		self.behaviour().fetch = Err(error);
	}

	/// Simulates the site dropping the login; cleared by the next launch.
	pub fn log_out(&self) {
		self.behaviour().logged_out = true;
	}

	pub fn set_context_gone(&self, gone: bool) {
		self.behaviour().context_gone = gone;
	}

	pub fn set_conversation_delay(&self, delay: Duration) {
		self.behaviour().conversation_delay = delay;
	}

	pub fn launches(&self) -> usize {
		self.shared.launches.load(Ordering::SeqCst)
	}

	pub fn submits(&self) -> usize {
		self.shared.submits.load(Ordering::SeqCst)
	}

	pub fn contexts_closed(&self) -> usize {
		self.shared.contexts_closed.load(Ordering::SeqCst)
	}

	pub fn scopes_opened(&self) -> usize {
		self.shared.scopes.lock().len()
	}

	pub fn scopes_closed(&self) -> usize {
		self.shared.scopes_closed.load(Ordering::SeqCst)
	}

	pub fn fetches(&self) -> Vec<FetchRequest> {
		self.shared.fetches.lock().clone()
	}

	/// Call logs of every scope opened so far, in open order.
	pub fn scope_logs(&self) -> Vec<Vec<String>> {
		self.shared
			.scopes
			.lock()
			.iter()
			.map(|log| log.lock().clone())
			.collect()
	}

	/// Call logs of scopes that visited a conversation page.
	pub fn conversation_logs(&self) -> Vec<Vec<String>> {
		self.scope_logs()
			.into_iter()
			.filter(|log| log.iter().any(|call| call.starts_with("navigate:") && call.contains("/messages/")))
			.collect()
	}
}

#[async_trait]
impl Driver for MockDriver {
	async fn launch(&self) -> DriverResult<Arc<dyn AutomationContext>> {
		self.shared.launches.fetch_add(1, Ordering::SeqCst);
		let (fail, delay) = {
			let mut behaviour = self.behaviour();
			behaviour.logged_out = false;
			(behaviour.fail_launch, behaviour.launch_delay)
		};
		sleep(delay).await;
		if fail {
			return Err(DriverError::Unavailable("mock browser refused to start".into()));
		}
		*self.shared.submitted_at.lock() = None;
		Ok(Arc::new(MockContext {
			shared: Arc::clone(&self.shared),
			alive: Arc::new(AtomicBool::new(true)),
		}))
	}
}

struct MockContext {
	shared: Arc<Shared>,
	alive: Arc<AtomicBool>,
}

#[async_trait]
impl AutomationContext for MockContext {
	async fn open_scope(&self) -> DriverResult<Box<dyn Scope>> {
		if !self.alive.load(Ordering::SeqCst) || self.shared.behaviour.lock().context_gone {
			return Err(DriverError::ContextClosed("mock context closed".into()));
		}
		let log = Arc::new(Mutex::new(Vec::new()));
		self.shared.scopes.lock().push(Arc::clone(&log));
		Ok(Box::new(MockScope {
			shared: Arc::clone(&self.shared),
			log,
			url: Mutex::new(String::from("about:blank")),
		}))
	}

	async fn fetch(&self, request: FetchRequest) -> DriverResult<FetchResponse> {
		self.shared.fetches.lock().push(request);
		self.shared.behaviour.lock().fetch.clone()
	}

	async fn close(&self) -> DriverResult<()> {
		self.alive.store(false, Ordering::SeqCst);
		self.shared.contexts_closed.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

struct MockScope {
	shared: Arc<Shared>,
	log: Arc<Mutex<Vec<String>>>,
	url: Mutex<String>,
}

impl MockScope {
	fn record(&self, call: String) {
		self.log.lock().push(call);
	}

	fn injected(&self, selector: &str) -> DriverResult<()> {
		match self.shared.behaviour.lock().failures.get(selector) {
			Some(err) => Err(err.clone()),
			None => Ok(()),
		}
	}

	fn on_login_page(&self) -> bool {
		self.url.lock().ends_with(&self.shared.login_path)
	}

	fn visible(&self, selector: &str) -> bool {
		let s = &self.shared.selectors;
		let behaviour = self.shared.behaviour.lock();

		if !self.on_login_page() {
			if behaviour.logged_out {
				return selector == s.login_form;
			}
			if behaviour.hidden.iter().any(|hidden| hidden == selector) {
				return false;
			}
			return selector == s.message_input || selector == s.authenticated_landmark;
		}

		let submitted = *self.shared.submitted_at.lock();
		let confirmed = |after: Option<Duration>| match (submitted, after) {
			(Some(at), Some(after)) => at.elapsed() >= after,
			_ => false,
		};
		let prompt = s.step_up_prompt.as_deref() == Some(selector);
		let error = s.login_error.as_deref() == Some(selector);

		match (behaviour.login, submitted.is_some()) {
			(LoginMode::Blank, _) => false,
			(LoginMode::AlreadyAuthenticated, _) => selector == s.authenticated_landmark,
			(_, false) => selector == s.login_form,
			(LoginMode::Form, true) => selector == s.authenticated_landmark,
			(LoginMode::Rejected, true) => error,
			(LoginMode::StepUp { confirm_after }, true) => {
				if confirmed(confirm_after) {
					selector == s.authenticated_landmark
				} else {
					prompt
				}
			}
			(LoginMode::SilentStepUp { confirm_after }, true) => {
				confirmed(confirm_after) && selector == s.authenticated_landmark
			}
		}
	}
}

#[async_trait]
impl Scope for MockScope {
	async fn navigate(&self, url: &str, _timeout: Duration) -> DriverResult<()> {
		self.record(format!("navigate:{url}"));
		*self.url.lock() = url.to_string();
		if url.contains("/messages/") {
			let delay = self.shared.behaviour.lock().conversation_delay;
			sleep(delay).await;
		}
		Ok(())
	}

	async fn wait_for(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
		self.record(format!("wait_for:{selector}"));
		self.injected(selector)?;
		let deadline = Instant::now() + timeout;
		while !self.visible(selector) {
			if Instant::now() >= deadline {
				return Err(DriverError::Timeout {
					what: selector.to_string(),
					ms: timeout.as_millis() as u64,
				});
			}
			sleep(Duration::from_millis(2)).await;
		}
		Ok(())
	}

	async fn is_visible(&self, selector: &str) -> DriverResult<bool> {
		Ok(self.visible(selector))
	}

	async fn fill(&self, selector: &str, text: &str) -> DriverResult<()> {
		self.injected(selector)?;
		if selector == self.shared.selectors.password_input {
			self.record(format!("fill:{selector}:<password>"));
		} else {
			self.record(format!("fill:{selector}:{text}"));
		}
		Ok(())
	}

	async fn click(&self, selector: &str) -> DriverResult<()> {
		self.injected(selector)?;
		self.record(format!("click:{selector}"));
		if selector == self.shared.selectors.login_submit && self.on_login_page() {
			self.shared.submits.fetch_add(1, Ordering::SeqCst);
			*self.shared.submitted_at.lock() = Some(Instant::now());
		}
		Ok(())
	}

	async fn read_text(&self, selector: &str) -> DriverResult<String> {
		self.record(format!("read_text:{selector}"));
		Ok("Incorrect password".into())
	}

	async fn set_input_files(&self, selector: &str, files: &[PathBuf]) -> DriverResult<()> {
		self.injected(selector)?;
		let names: Vec<_> = files.iter().map(|file| file.display().to_string()).collect();
		self.record(format!("files:{selector}:{}", names.join(",")));
		Ok(())
	}

	async fn close(&self) -> DriverResult<()> {
		self.record("close".into());
		self.shared.scopes_closed.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}
