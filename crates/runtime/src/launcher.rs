//! Chromium process launch and DevTools endpoint discovery.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{Error, Result};

/// Default remote debugging port for launched browsers.
pub const DEFAULT_DEBUGGING_PORT: u16 = 9333;

/// `/json/version` response subset from Chrome DevTools Protocol.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpVersionInfo {
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
	#[serde(rename = "Browser")]
	pub browser: Option<String>,
	#[serde(rename = "User-Agent")]
	pub user_agent: Option<String>,
}

/// Options for launching a local Chromium-family browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
	/// Explicit executable; located automatically when `None`.
	pub executable: Option<PathBuf>,
	pub headless: bool,
	pub remote_debugging_port: u16,
	/// Profile directory; a per-port temp directory when `None`.
	pub user_data_dir: Option<PathBuf>,
	pub extra_args: Vec<String>,
	/// How long to wait for the DevTools endpoint after spawning.
	pub startup_timeout: Duration,
}

impl Default for LaunchOptions {
	fn default() -> Self {
		Self {
			executable: None,
			headless: true,
			remote_debugging_port: DEFAULT_DEBUGGING_PORT,
			user_data_dir: None,
			extra_args: Vec::new(),
			startup_timeout: Duration::from_secs(15),
		}
	}
}

impl LaunchOptions {
	/// Command-line arguments passed to the browser.
	pub fn args(&self) -> Vec<String> {
		let user_data_dir = self
			.user_data_dir
			.clone()
			.unwrap_or_else(|| std::env::temp_dir().join(format!("msgr-profile-{}", self.remote_debugging_port)));

		let mut args = vec![
			format!("--remote-debugging-port={}", self.remote_debugging_port),
			format!("--user-data-dir={}", user_data_dir.display()),
			"--no-first-run".to_string(),
			"--no-default-browser-check".to_string(),
			"--disable-background-networking".to_string(),
		];
		if self.headless {
			args.push("--headless=new".to_string());
		}
		args.extend(self.extra_args.iter().cloned());
		args.push("about:blank".to_string());
		args
	}
}

/// Locates a Chromium-family executable on this machine.
pub fn find_chrome_executable() -> Option<PathBuf> {
	let candidates: &[&str] = if cfg!(target_os = "macos") {
		&[
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
		]
	} else if cfg!(target_os = "windows") {
		&["chrome.exe", "msedge.exe", "chromium.exe"]
	} else {
		&[
			"google-chrome-stable",
			"google-chrome",
			"chromium-browser",
			"chromium",
			"brave-browser",
			"/usr/bin/google-chrome-stable",
			"/usr/bin/chromium",
			"/snap/bin/chromium",
		]
	};

	candidates.iter().find_map(|candidate| {
		let path = Path::new(candidate);
		if path.is_absolute() {
			path.exists().then(|| path.to_path_buf())
		} else {
			which::which(candidate).ok()
		}
	})
}

/// Resolves CDP version metadata from `/json/version` on `port`.
pub async fn fetch_cdp_endpoint(port: u16) -> Result<CdpVersionInfo> {
	fetch_version_info(&format!("http://127.0.0.1:{port}")).await
}

async fn fetch_version_info(base: &str) -> Result<CdpVersionInfo> {
	let client = reqwest::Client::builder().timeout(Duration::from_millis(800)).build()?;
	let url = format!("{}/json/version", base.trim_end_matches('/'));
	let response = client
		.get(&url)
		.send()
		.await
		.map_err(|e| Error::ConnectionFailed(format!("{url}: {e}")))?;

	if !response.status().is_success() {
		return Err(Error::ConnectionFailed(format!("{url}: unexpected status {}", response.status())));
	}

	Ok(response.json::<CdpVersionInfo>().await?)
}

/// Turns an endpoint into a browser WebSocket URL.
///
/// `ws://` and `wss://` URLs are returned as-is; `http://host:port` endpoints
/// are resolved through `/json/version`.
pub async fn resolve_ws_endpoint(endpoint: &str) -> Result<String> {
	if is_websocket_url(endpoint) {
		return Ok(endpoint.to_string());
	}
	let info = fetch_version_info(endpoint).await?;
	Ok(info.web_socket_debugger_url)
}

fn is_websocket_url(endpoint: &str) -> bool {
	endpoint.starts_with("ws://") || endpoint.starts_with("wss://")
}

/// Spawns a browser and waits until its DevTools endpoint answers.
///
/// The returned child is killed when dropped.
pub async fn launch(options: &LaunchOptions) -> Result<(Child, CdpVersionInfo)> {
	let executable = match &options.executable {
		Some(path) => path.clone(),
		None => find_chrome_executable().ok_or(Error::BrowserNotFound)?,
	};

	let mut cmd = Command::new(&executable);
	cmd.args(options.args())
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.kill_on_drop(true);

	debug!(
		target = "msgr.cdp",
		executable = %executable.display(),
		port = options.remote_debugging_port,
		headless = options.headless,
		"launching browser"
	);

	let mut child = cmd
		.spawn()
		.map_err(|e| Error::LaunchFailed(format!("{}: {e}", executable.display())))?;

	let deadline = tokio::time::Instant::now() + options.startup_timeout;
	let mut last_error = "endpoint not reachable".to_string();
	while tokio::time::Instant::now() < deadline {
		tokio::time::sleep(Duration::from_millis(200)).await;

		if let Some(status) = child.try_wait()? {
			return Err(Error::LaunchFailed(format!(
				"browser exited before the debugging endpoint became available (status: {status})"
			)));
		}

		match fetch_cdp_endpoint(options.remote_debugging_port).await {
			Ok(info) => return Ok((child, info)),
			Err(err) => last_error = err.to_string(),
		}
	}

	Err(Error::LaunchFailed(format!(
		"debugging endpoint not available on port {} after {}ms: {last_error}",
		options.remote_debugging_port,
		options.startup_timeout.as_millis()
	)))
}
