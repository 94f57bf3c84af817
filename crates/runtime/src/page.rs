//! Page session: one attached target with its own navigation.
//!
//! Element operations are expressed as small DOM scripts evaluated in the
//! page, except text entry which goes through `Input.insertText` so that
//! framework-managed inputs observe real input events.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::debug;

use crate::connection::Connection;
use crate::error::{Error, Result};

/// Default interval between readiness checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Window property set on a document that is being navigated away from.
const NAVIGATION_MARKER: &str = "window.__msgrLeaving";

/// A page target attached over a flattened CDP session.
pub struct Page {
	connection: Arc<Connection>,
	target_id: String,
	session_id: String,
	poll_interval: Duration,
}

impl Page {
	pub(crate) fn new(connection: Arc<Connection>, target_id: String, session_id: String) -> Self {
		Self {
			connection,
			target_id,
			session_id,
			poll_interval: DEFAULT_POLL_INTERVAL,
		}
	}

	/// Overrides the interval used by waits.
	pub fn set_poll_interval(&mut self, interval: Duration) {
		self.poll_interval = interval;
	}

	pub fn target_id(&self) -> &str {
		&self.target_id
	}

	async fn call(&self, method: &str, params: Value) -> Result<Value> {
		self.connection.send(method, params, Some(&self.session_id)).await
	}

	/// Evaluates `expression` and returns its JSON value.
	pub async fn evaluate(&self, expression: &str) -> Result<Value> {
		let result = self
			.call(
				"Runtime.evaluate",
				json!({ "expression": expression, "returnByValue": true, "awaitPromise": true }),
			)
			.await?;

		if let Some(details) = result.get("exceptionDetails") {
			let message = details
				.pointer("/exception/description")
				.or_else(|| details.get("text"))
				.and_then(Value::as_str)
				.unwrap_or("script threw")
				.to_string();
			return Err(Error::Evaluation(message));
		}

		Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
	}

	/// Navigates and waits for the new document to finish loading.
	///
	/// The outgoing document is tagged first, so its own `complete` state is
	/// not mistaken for the new one's before the navigation commits.
	pub async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
		debug!(target = "msgr.cdp", target_id = %self.target_id, url, "navigate");
		match self.evaluate(&format!("{NAVIGATION_MARKER} = true")).await {
			Ok(_) | Err(Error::Evaluation(_)) => {}
			Err(err) => return Err(err),
		}

		let result = self.call("Page.navigate", json!({ "url": url })).await?;

		if let Some(reason) = result.get("errorText").and_then(Value::as_str).filter(|t| !t.is_empty()) {
			return Err(Error::Navigation {
				url: url.to_string(),
				reason: reason.to_string(),
			});
		}

		// No loader means a same-document navigation: the tagged window stays.
		let new_document = result
			.get("loaderId")
			.and_then(Value::as_str)
			.is_some_and(|loader| !loader.is_empty());
		self.wait_for_expression(&ready_script(new_document), timeout, &format!("navigation to {url}"))
			.await
	}

	/// Returns whether `selector` matches a rendered, visible element.
	pub async fn is_visible(&self, selector: &str) -> Result<bool> {
		match self.evaluate(&visible_script(selector)).await {
			Ok(value) => Ok(value.as_bool().unwrap_or(false)),
			Err(Error::Evaluation(_)) => Ok(false),
			Err(err) => Err(err),
		}
	}

	/// Waits until `selector` matches a visible element.
	pub async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
		self.wait_for_expression(&visible_script(selector), timeout, &format!("selector {selector}"))
			.await
	}

	/// Focuses and clears the element, then types `text` into it.
	pub async fn fill(&self, selector: &str, text: &str) -> Result<()> {
		let focused = self.evaluate(&focus_and_clear_script(selector)).await?;
		if focused != Value::Bool(true) {
			return Err(Error::ElementNotFound(selector.to_string()));
		}
		if !text.is_empty() {
			self.call("Input.insertText", json!({ "text": text })).await?;
		}
		Ok(())
	}

	pub async fn click(&self, selector: &str) -> Result<()> {
		let clicked = self.evaluate(&click_script(selector)).await?;
		if clicked != Value::Bool(true) {
			return Err(Error::ElementNotFound(selector.to_string()));
		}
		Ok(())
	}

	/// Returns the rendered text of the first element matching `selector`.
	pub async fn inner_text(&self, selector: &str) -> Result<String> {
		match self.evaluate(&text_script(selector)).await? {
			Value::String(text) => Ok(text),
			_ => Err(Error::ElementNotFound(selector.to_string())),
		}
	}

	/// Sets local files on an `<input type=file>`.
	pub async fn set_input_files(&self, selector: &str, files: &[PathBuf]) -> Result<()> {
		let document = self.call("DOM.getDocument", json!({ "depth": 0 })).await?;
		let root = document
			.pointer("/root/nodeId")
			.and_then(Value::as_i64)
			.ok_or_else(|| Error::Evaluation("DOM.getDocument returned no root node".into()))?;

		let found = self
			.call("DOM.querySelector", json!({ "nodeId": root, "selector": selector }))
			.await?;
		let node_id = found.get("nodeId").and_then(Value::as_i64).unwrap_or(0);
		if node_id == 0 {
			return Err(Error::ElementNotFound(selector.to_string()));
		}

		let files: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
		self.call("DOM.setFileInputFiles", json!({ "files": files, "nodeId": node_id }))
			.await?;
		Ok(())
	}

	/// Closes the page target. Closing an already-gone target succeeds.
	pub async fn close(&self) -> Result<()> {
		match self
			.connection
			.send("Target.closeTarget", json!({ "targetId": self.target_id }), None)
			.await
		{
			Ok(_) => Ok(()),
			Err(err) if err.is_target_closed() => Ok(()),
			Err(err) => Err(err),
		}
	}

	async fn wait_for_expression(&self, expression: &str, timeout: Duration, what: &str) -> Result<()> {
		let deadline = Instant::now() + timeout;
		loop {
			match self.evaluate(expression).await {
				Ok(Value::Bool(true)) => return Ok(()),
				// Contexts are torn down and recreated while a navigation commits.
				Ok(_) | Err(Error::Evaluation(_)) | Err(Error::Protocol { .. }) => {}
				Err(err) => return Err(err),
			}

			let now = Instant::now();
			if now >= deadline {
				return Err(Error::Timeout {
					what: what.to_string(),
					ms: timeout.as_millis() as u64,
				});
			}
			tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
		}
	}
}

fn js_string(value: &str) -> String {
	serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn ready_script(new_document: bool) -> String {
	if new_document {
		format!("document.readyState === 'complete' && {NAVIGATION_MARKER} !== true")
	} else {
		format!("(delete {NAVIGATION_MARKER}, document.readyState === 'complete')")
	}
}

fn visible_script(selector: &str) -> String {
	format!(
		"(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
		 const style = window.getComputedStyle(el); \
		 if (style.visibility === 'hidden' || style.display === 'none') return false; \
		 return !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length); }})()",
		sel = js_string(selector)
	)
}

fn focus_and_clear_script(selector: &str) -> String {
	format!(
		"(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
		 el.scrollIntoView({{ block: 'center' }}); el.focus(); \
		 if (el.isContentEditable) {{ \
		   const range = document.createRange(); range.selectNodeContents(el); \
		   const selection = window.getSelection(); selection.removeAllRanges(); selection.addRange(range); \
		   document.execCommand('delete'); \
		 }} else if ('value' in el) {{ \
		   el.value = ''; el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
		 }} \
		 return true; }})()",
		sel = js_string(selector)
	)
}

fn click_script(selector: &str) -> String {
	format!(
		"(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
		 el.scrollIntoView({{ block: 'center' }}); el.click(); return true; }})()",
		sel = js_string(selector)
	)
}

fn text_script(selector: &str) -> String {
	format!(
		"(() => {{ const el = document.querySelector({sel}); \
		 return el ? (el.innerText ?? el.textContent ?? '') : null; }})()",
		sel = js_string(selector)
	)
}
