//! Service configuration.
//!
//! Loaded from a camelCase JSON file (by default `<config_dir>/msgr/config.json`),
//! then overlaid with `MSGR_*` environment variables. Every section has
//! defaults, so a partial file is enough.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

const CONFIG_DIR_NAME: &str = "msgr";
const CONFIG_FILE_NAME: &str = "config.json";

pub const ENV_USERNAME: &str = "MSGR_USERNAME";
pub const ENV_PASSWORD: &str = "MSGR_PASSWORD";
pub const ENV_BASE_URL: &str = "MSGR_BASE_URL";
pub const ENV_CDP_ENDPOINT: &str = "MSGR_CDP_ENDPOINT";

/// Placeholder replaced with the conversation id in [`SiteConfig::conversation_path`].
pub const TARGET_PLACEHOLDER: &str = "{target}";
/// Placeholder replaced with [`SiteConfig::page_size`] in list paths and bodies.
pub const PAGE_SIZE_PLACEHOLDER: &str = "{pageSize}";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
	pub site: SiteConfig,
	pub credentials: Credentials,
	pub selectors: Selectors,
	pub timeouts: Timeouts,
	pub browser: BrowserConfig,
}

/// Remote site layout: where to log in, converse and list conversations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteConfig {
	pub base_url: String,
	pub login_path: String,
	pub conversation_path: String,
	pub conversation_list_path: String,
	pub conversation_list_method: String,
	pub conversation_list_headers: BTreeMap<String, String>,
	pub conversation_list_body: Option<String>,
	pub page_size: u32,
}

impl Default for SiteConfig {
	fn default() -> Self {
		Self {
			base_url: String::new(),
			login_path: "/login".into(),
			conversation_path: "/messages/{target}".into(),
			conversation_list_path: "/api/conversations?limit={pageSize}".into(),
			conversation_list_method: "GET".into(),
			conversation_list_headers: BTreeMap::from([("Accept".to_string(), "application/json".to_string())]),
			conversation_list_body: None,
			page_size: 50,
		}
	}
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Credentials {
	pub username: String,
	pub password: String,
}

impl Credentials {
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self {
			username: username.into(),
			password: password.into(),
		}
	}

	pub fn is_complete(&self) -> bool {
		!self.username.is_empty() && !self.password.is_empty()
	}
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// CSS selectors for every UI landmark the service relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Selectors {
	pub login_form: String,
	pub username_input: String,
	pub password_input: String,
	pub login_submit: String,
	pub authenticated_landmark: String,
	/// Shown while the site waits for out-of-band confirmation.
	pub step_up_prompt: Option<String>,
	/// Shown when the site rejects the submitted credentials.
	pub login_error: Option<String>,
	pub message_input: String,
	pub send_action: String,
	pub attach_menu: String,
	pub attach_image_option: String,
	pub attach_file_option: String,
	pub attachment_file_input: String,
	pub attachment_url_input: String,
	pub attachment_confirm: String,
}

impl Default for Selectors {
	fn default() -> Self {
		Self {
			login_form: "form[action*=\"login\"]".into(),
			username_input: "input[name=\"username\"]".into(),
			password_input: "input[type=\"password\"]".into(),
			login_submit: "button[type=\"submit\"]".into(),
			authenticated_landmark: "[data-testid=\"conversation-list\"]".into(),
			step_up_prompt: Some("[data-testid=\"device-confirmation\"]".into()),
			login_error: None,
			message_input: "[contenteditable=\"true\"][role=\"textbox\"]".into(),
			send_action: "button[aria-label=\"Send\"]".into(),
			attach_menu: "button[aria-label=\"Attach\"]".into(),
			attach_image_option: "[data-testid=\"attach-image\"]".into(),
			attach_file_option: "[data-testid=\"attach-file\"]".into(),
			attachment_file_input: "input[type=\"file\"]".into(),
			attachment_url_input: "input[name=\"attachment-url\"]".into(),
			attachment_confirm: "[data-testid=\"attach-confirm\"]".into(),
		}
	}
}

/// Upper bounds for every wait, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timeouts {
	pub navigation_ms: u64,
	pub login_ms: u64,
	pub step_up_ms: u64,
	pub input_ms: u64,
	pub settle_ms: u64,
	pub fetch_ms: u64,
	pub poll_interval_ms: u64,
}

impl Default for Timeouts {
	fn default() -> Self {
		Self {
			navigation_ms: 30_000,
			login_ms: 30_000,
			step_up_ms: 60_000,
			input_ms: 10_000,
			settle_ms: 1_500,
			fetch_ms: 15_000,
			poll_interval_ms: 250,
		}
	}
}

impl Timeouts {
	pub fn navigation(&self) -> Duration {
		Duration::from_millis(self.navigation_ms)
	}

	pub fn login(&self) -> Duration {
		Duration::from_millis(self.login_ms)
	}

	pub fn step_up(&self) -> Duration {
		Duration::from_millis(self.step_up_ms)
	}

	pub fn input(&self) -> Duration {
		Duration::from_millis(self.input_ms)
	}

	pub fn settle(&self) -> Duration {
		Duration::from_millis(self.settle_ms)
	}

	pub fn fetch(&self) -> Duration {
		Duration::from_millis(self.fetch_ms)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserConfig {
	pub headless: bool,
	/// Attach to this browser (`ws://…` or `http://host:port`) instead of launching one.
	pub cdp_endpoint: Option<String>,
	pub executable: Option<PathBuf>,
	pub remote_debugging_port: u16,
	pub user_data_dir: Option<PathBuf>,
	pub extra_args: Vec<String>,
	pub call_timeout_ms: u64,
}

impl Default for BrowserConfig {
	fn default() -> Self {
		Self {
			headless: true,
			cdp_endpoint: None,
			executable: None,
			remote_debugging_port: msgr_runtime::launcher::DEFAULT_DEBUGGING_PORT,
			user_data_dir: None,
			extra_args: Vec::new(),
			call_timeout_ms: msgr_runtime::DEFAULT_CALL_TIMEOUT.as_millis() as u64,
		}
	}
}

impl BrowserConfig {
	pub fn call_timeout(&self) -> Duration {
		Duration::from_millis(self.call_timeout_ms)
	}
}

/// `<config_dir>/msgr/config.json`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

impl Config {
	/// Loads, applies environment overrides and validates.
	///
	/// An explicit `path` must exist. Without one, the default path is used
	/// when present and defaults otherwise.
	pub fn load(path: Option<&Path>) -> Result<Self> {
		let mut config = match path {
			Some(path) => Self::read(path)?,
			None => match default_config_path() {
				Some(path) if path.exists() => Self::read(&path)?,
				_ => Self::default(),
			},
		};
		config.apply_env(|key| std::env::var(key).ok());
		config.validate()?;
		Ok(config)
	}

	pub fn read(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.map_err(|err| Error::Config(format!("cannot read {}: {err}", path.display())))?;
		serde_json::from_str(&content).map_err(|err| Error::Config(format!("invalid config {}: {err}", path.display())))
	}

	/// Overlays `MSGR_*` variables; `lookup` returns `None` for unset keys.
	pub fn apply_env<F>(&mut self, lookup: F)
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(username) = lookup(ENV_USERNAME) {
			self.credentials.username = username;
		}
		if let Some(password) = lookup(ENV_PASSWORD) {
			self.credentials.password = password;
		}
		if let Some(base_url) = lookup(ENV_BASE_URL) {
			self.site.base_url = base_url;
		}
		if let Some(endpoint) = lookup(ENV_CDP_ENDPOINT).filter(|value| !value.is_empty()) {
			self.browser.cdp_endpoint = Some(endpoint);
		}
	}

	pub fn validate(&self) -> Result<()> {
		let base_url = self.site.base_url.trim();
		if base_url.is_empty() {
			return Err(Error::Config(format!("site.baseUrl is not set (or set {ENV_BASE_URL})")));
		}
		let parsed = Url::parse(base_url).map_err(|err| Error::Config(format!("site.baseUrl '{base_url}': {err}")))?;
		if !matches!(parsed.scheme(), "http" | "https") {
			return Err(Error::Config(format!("site.baseUrl must be http(s), got '{}'", parsed.scheme())));
		}
		if !self.site.conversation_path.contains(TARGET_PLACEHOLDER) {
			return Err(Error::Config(format!(
				"site.conversationPath must contain {TARGET_PLACEHOLDER}"
			)));
		}
		if self.timeouts.poll_interval_ms == 0 {
			return Err(Error::Config("timeouts.pollIntervalMs must be greater than zero".into()));
		}
		Ok(())
	}
}
