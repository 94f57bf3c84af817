//! Browser handle: launched or attached over CDP.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::launcher::{self, LaunchOptions};
use crate::page::Page;

/// Cookie as reported by `Storage.getCookies`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
	pub name: String,
	pub value: String,
	pub domain: String,
	#[serde(default = "default_path")]
	pub path: String,
	#[serde(default)]
	pub secure: bool,
	/// Seconds since epoch; negative for session cookies.
	#[serde(default)]
	pub expires: f64,
}

fn default_path() -> String {
	"/".to_string()
}

/// A browser reachable over a single multiplexed CDP connection.
pub struct Browser {
	connection: Arc<Connection>,
	/// Present only when this handle launched the process.
	process: Mutex<Option<Child>>,
	user_agent: Option<String>,
}

impl Browser {
	/// Launches a local browser and connects to it.
	pub async fn launch(options: &LaunchOptions, call_timeout: Duration) -> Result<Self> {
		let (child, info) = launcher::launch(options).await?;
		let connection = Connection::connect(&info.web_socket_debugger_url, call_timeout).await?;
		debug!(
			target = "msgr.cdp",
			browser = info.browser.as_deref().unwrap_or("unknown"),
			"browser launched"
		);
		Ok(Self {
			connection,
			process: Mutex::new(Some(child)),
			user_agent: info.user_agent,
		})
	}

	/// Attaches to an already-running browser (`ws://` URL or `http://host:port`).
	pub async fn connect(endpoint: &str, call_timeout: Duration) -> Result<Self> {
		let ws_url = launcher::resolve_ws_endpoint(endpoint).await?;
		let connection = Connection::connect(&ws_url, call_timeout).await?;
		let version = connection.send("Browser.getVersion", json!({}), None).await?;
		let user_agent = version.get("userAgent").and_then(Value::as_str).map(str::to_string);
		debug!(target = "msgr.cdp", endpoint, "attached to existing browser");
		Ok(Self {
			connection,
			process: Mutex::new(None),
			user_agent,
		})
	}

	pub fn is_connected(&self) -> bool {
		!self.connection.is_closed()
	}

	pub fn user_agent(&self) -> Option<&str> {
		self.user_agent.as_deref()
	}

	/// Opens a new page in the default browser context.
	///
	/// Pages of the default context share cookies and storage.
	pub async fn new_page(&self) -> Result<Page> {
		let created = self
			.connection
			.send("Target.createTarget", json!({ "url": "about:blank" }), None)
			.await?;
		let target_id = created
			.get("targetId")
			.and_then(Value::as_str)
			.ok_or_else(|| Error::Evaluation("Target.createTarget returned no targetId".into()))?
			.to_string();

		let attached = self
			.connection
			.send("Target.attachToTarget", json!({ "targetId": target_id, "flatten": true }), None)
			.await?;
		let session_id = attached
			.get("sessionId")
			.and_then(Value::as_str)
			.ok_or_else(|| Error::Evaluation("Target.attachToTarget returned no sessionId".into()))?
			.to_string();

		Ok(Page::new(Arc::clone(&self.connection), target_id, session_id))
	}

	/// Returns every cookie in the default browser context.
	pub async fn cookies(&self) -> Result<Vec<Cookie>> {
		let result = self.connection.send("Storage.getCookies", json!({}), None).await?;
		let cookies = result.get("cookies").cloned().unwrap_or(Value::Array(Vec::new()));
		Ok(serde_json::from_value(cookies)?)
	}

	/// Closes the browser when launched by this handle; attached browsers are left running.
	pub async fn close(&self) -> Result<()> {
		let Some(mut child) = self.process.lock().await.take() else {
			return Ok(());
		};

		if let Err(err) = self.connection.send("Browser.close", json!({}), None).await {
			debug!(target = "msgr.cdp", error = %err, "Browser.close failed; killing process");
		}

		match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
			Ok(Ok(status)) => {
				debug!(target = "msgr.cdp", %status, "browser exited");
				Ok(())
			}
			Ok(Err(err)) => Err(Error::Io(err)),
			Err(_) => {
				warn!(target = "msgr.cdp", "browser did not exit in time; killing");
				child.kill().await?;
				Ok(())
			}
		}
	}
}
