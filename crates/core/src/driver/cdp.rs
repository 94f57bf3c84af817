//! Driver implementation over the Chrome DevTools Protocol.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use msgr_runtime::{Browser, Cookie, LaunchOptions, Page};
use reqwest::header::{COOKIE, HeaderName, HeaderValue, USER_AGENT};
use tracing::debug;
use url::Url;

use super::{AutomationContext, Driver, DriverError, DriverResult, FetchRequest, FetchResponse, Scope};
use crate::config::BrowserConfig;
use crate::ids::now_ms;

/// Launches (or attaches to) a Chromium-family browser per context.
#[derive(Debug, Clone)]
pub struct CdpDriver {
	config: BrowserConfig,
	poll_interval: Duration,
}

impl CdpDriver {
	pub fn new(config: BrowserConfig, poll_interval: Duration) -> Self {
		Self { config, poll_interval }
	}

	fn launch_options(&self) -> LaunchOptions {
		LaunchOptions {
			executable: self.config.executable.clone(),
			headless: self.config.headless,
			remote_debugging_port: self.config.remote_debugging_port,
			user_data_dir: self.config.user_data_dir.clone(),
			extra_args: self.config.extra_args.clone(),
			..LaunchOptions::default()
		}
	}
}

#[async_trait]
impl Driver for CdpDriver {
	async fn launch(&self) -> DriverResult<Arc<dyn AutomationContext>> {
		let call_timeout = self.config.call_timeout();
		let browser = match self.config.cdp_endpoint.as_deref() {
			Some(endpoint) => Browser::connect(endpoint, call_timeout).await,
			None => Browser::launch(&self.launch_options(), call_timeout).await,
		}
		.map_err(|err| DriverError::Unavailable(err.to_string()))?;

		let http = reqwest::Client::builder()
			.build()
			.map_err(|err| DriverError::Unavailable(format!("http client: {err}")))?;

		Ok(Arc::new(CdpContext {
			browser,
			http,
			poll_interval: self.poll_interval,
		}))
	}
}

struct CdpContext {
	browser: Browser,
	http: reqwest::Client,
	poll_interval: Duration,
}

#[async_trait]
impl AutomationContext for CdpContext {
	async fn open_scope(&self) -> DriverResult<Box<dyn Scope>> {
		if !self.browser.is_connected() {
			return Err(DriverError::ContextClosed("browser connection closed".into()));
		}
		let mut page = self.browser.new_page().await.map_err(map_error)?;
		page.set_poll_interval(self.poll_interval);
		debug!(target = "msgr.cdp", target_id = page.target_id(), "scope opened");
		Ok(Box::new(CdpScope { page }))
	}

	async fn fetch(&self, request: FetchRequest) -> DriverResult<FetchResponse> {
		let url = Url::parse(&request.url).map_err(|err| DriverError::Failed(format!("invalid url {}: {err}", request.url)))?;
		let cookies = self.browser.cookies().await.map_err(map_error)?;
		let method = reqwest::Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
			.map_err(|err| DriverError::Failed(format!("invalid method {}: {err}", request.method)))?;

		let mut builder = self.http.request(method, url.clone()).timeout(request.timeout);
		let mut has_user_agent = false;
		for (name, value) in &request.headers {
			let name = HeaderName::from_bytes(name.as_bytes())
				.map_err(|err| DriverError::Failed(format!("invalid header name {name}: {err}")))?;
			let value = HeaderValue::from_str(value).map_err(|err| DriverError::Failed(format!("invalid header {name}: {err}")))?;
			has_user_agent |= name == USER_AGENT;
			builder = builder.header(name, value);
		}
		if let Some(cookie) = cookie_header(&url, &cookies, now_ms() as f64 / 1000.0) {
			builder = builder.header(COOKIE, cookie);
		}
		if !has_user_agent {
			if let Some(agent) = self.browser.user_agent() {
				builder = builder.header(USER_AGENT, agent);
			}
		}
		if let Some(body) = request.body {
			builder = builder.body(body);
		}

		let response = builder.send().await.map_err(|err| map_http_error(err, &request.url, request.timeout))?;
		let status = response.status().as_u16();
		let headers = response
			.headers()
			.iter()
			.filter_map(|(name, value)| value.to_str().ok().map(|value| (name.to_string(), value.to_string())))
			.collect();
		let body = response
			.text()
			.await
			.map_err(|err| map_http_error(err, &request.url, request.timeout))?;
		debug!(target = "msgr.cdp", url = %url, status, bytes = body.len(), "fetch completed");

		Ok(FetchResponse { status, headers, body })
	}

	async fn close(&self) -> DriverResult<()> {
		self.browser.close().await.map_err(map_error)
	}
}

struct CdpScope {
	page: Page,
}

#[async_trait]
impl Scope for CdpScope {
	async fn navigate(&self, url: &str, timeout: Duration) -> DriverResult<()> {
		self.page.goto(url, timeout).await.map_err(map_error)
	}

	async fn wait_for(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
		self.page.wait_for(selector, timeout).await.map_err(map_error)
	}

	async fn is_visible(&self, selector: &str) -> DriverResult<bool> {
		self.page.is_visible(selector).await.map_err(map_error)
	}

	async fn fill(&self, selector: &str, text: &str) -> DriverResult<()> {
		self.page.fill(selector, text).await.map_err(map_error)
	}

	async fn click(&self, selector: &str) -> DriverResult<()> {
		self.page.click(selector).await.map_err(map_error)
	}

	async fn read_text(&self, selector: &str) -> DriverResult<String> {
		self.page.inner_text(selector).await.map_err(map_error)
	}

	async fn set_input_files(&self, selector: &str, files: &[PathBuf]) -> DriverResult<()> {
		self.page.set_input_files(selector, files).await.map_err(map_error)
	}

	async fn close(&self) -> DriverResult<()> {
		self.page.close().await.map_err(map_error)
	}
}

fn map_error(err: msgr_runtime::Error) -> DriverError {
	use msgr_runtime::Error;

	if err.is_target_closed() {
		return DriverError::ContextClosed(err.to_string());
	}
	match err {
		Error::Timeout { what, ms } => DriverError::Timeout { what, ms },
		Error::ElementNotFound(selector) => DriverError::ElementNotFound(selector),
		Error::Navigation { .. } => DriverError::Navigation(err.to_string()),
		Error::BrowserNotFound | Error::LaunchFailed(_) => DriverError::Unavailable(err.to_string()),
		other => DriverError::Failed(other.to_string()),
	}
}

fn map_http_error(err: reqwest::Error, url: &str, timeout: Duration) -> DriverError {
	if err.is_timeout() {
		DriverError::Timeout {
			what: format!("fetch {url}"),
			ms: timeout.as_millis() as u64,
		}
	} else {
		DriverError::Failed(format!("fetch {url}: {err}"))
	}
}

/// Builds the `Cookie` header the browser would send for `url`.
///
/// `now_secs` is compared against cookie expiry; session cookies
/// (non-positive expiry) always match.
fn cookie_header(url: &Url, cookies: &[Cookie], now_secs: f64) -> Option<String> {
	let host = url.host_str()?;
	let secure = url.scheme() == "https";
	let path = url.path();

	let pairs: Vec<String> = cookies
		.iter()
		.filter(|cookie| domain_matches(host, &cookie.domain))
		.filter(|cookie| path_matches(path, &cookie.path))
		.filter(|cookie| secure || !cookie.secure)
		.filter(|cookie| cookie.expires <= 0.0 || cookie.expires > now_secs)
		.map(|cookie| format!("{}={}", cookie.name, cookie.value))
		.collect();

	if pairs.is_empty() { None } else { Some(pairs.join("; ")) }
}

fn domain_matches(host: &str, domain: &str) -> bool {
	let host = host.to_ascii_lowercase();
	let domain = domain.to_ascii_lowercase();
	match domain.strip_prefix('.') {
		Some(suffix) => host == suffix || host.ends_with(&format!(".{suffix}")),
		None => host == domain,
	}
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
	if cookie_path.is_empty() || cookie_path == "/" || request_path == cookie_path {
		return true;
	}
	request_path.starts_with(cookie_path)
		&& (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}
