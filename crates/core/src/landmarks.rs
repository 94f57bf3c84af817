//! Site-specific selectors and URLs.
//!
//! Everything that knows what the remote UI looks like lives here, so a
//! redesign on the site side only touches configuration.

use msgr_protocol::AttachmentKind;
use tracing::warn;
use url::Url;

use crate::config::{Config, PAGE_SIZE_PLACEHOLDER, Selectors, SiteConfig, TARGET_PLACEHOLDER};

#[derive(Debug, Clone)]
pub struct Landmarks {
	site: SiteConfig,
	selectors: Selectors,
}

impl Landmarks {
	pub fn new(site: SiteConfig, selectors: Selectors) -> Self {
		Self { site, selectors }
	}

	pub fn from_config(config: &Config) -> Self {
		Self::new(config.site.clone(), config.selectors.clone())
	}

	pub fn site(&self) -> &SiteConfig {
		&self.site
	}

	pub fn login_url(&self) -> String {
		self.absolute(&self.site.login_path)
	}

	/// Conversation page for `target`, with the id percent-encoded.
	pub fn conversation_url(&self, target: &str) -> String {
		let path = self
			.site
			.conversation_path
			.replace(TARGET_PLACEHOLDER, &urlencoding::encode(target));
		self.absolute(&path)
	}

	pub fn conversation_list_url(&self) -> String {
		let path = self
			.site
			.conversation_list_path
			.replace(PAGE_SIZE_PLACEHOLDER, &self.site.page_size.to_string());
		self.absolute(&path)
	}

	/// Request body for the list endpoint, with the page size substituted.
	pub fn conversation_list_body(&self) -> Option<String> {
		self.site
			.conversation_list_body
			.as_ref()
			.map(|body| body.replace(PAGE_SIZE_PLACEHOLDER, &self.site.page_size.to_string()))
	}

	pub fn login_form(&self) -> &str {
		&self.selectors.login_form
	}

	pub fn username_input(&self) -> &str {
		&self.selectors.username_input
	}

	pub fn password_input(&self) -> &str {
		&self.selectors.password_input
	}

	pub fn login_submit(&self) -> &str {
		&self.selectors.login_submit
	}

	pub fn authenticated_landmark(&self) -> &str {
		&self.selectors.authenticated_landmark
	}

	pub fn step_up_prompt(&self) -> Option<&str> {
		non_empty(self.selectors.step_up_prompt.as_deref())
	}

	pub fn login_error(&self) -> Option<&str> {
		non_empty(self.selectors.login_error.as_deref())
	}

	pub fn message_input(&self) -> &str {
		&self.selectors.message_input
	}

	pub fn send_action(&self) -> &str {
		&self.selectors.send_action
	}

	pub fn attach_menu(&self) -> &str {
		&self.selectors.attach_menu
	}

	/// Menu entry for an attachment kind; plain text has none.
	pub fn attach_option(&self, kind: AttachmentKind) -> Option<&str> {
		match kind {
			AttachmentKind::Text => None,
			AttachmentKind::Image => Some(&self.selectors.attach_image_option),
			AttachmentKind::File => Some(&self.selectors.attach_file_option),
		}
	}

	pub fn attachment_file_input(&self) -> &str {
		&self.selectors.attachment_file_input
	}

	pub fn attachment_url_input(&self) -> &str {
		&self.selectors.attachment_url_input
	}

	pub fn attachment_confirm(&self) -> &str {
		&self.selectors.attachment_confirm
	}

	/// Resolves `path` under the base URL, keeping any path prefix of the base.
	///
	/// Absolute URLs pass through. An unparseable base leaves `path` as-is;
	/// [`Config::validate`] rejects such bases at load time.
	fn absolute(&self, path: &str) -> String {
		let base = format!("{}/", self.site.base_url.trim_end_matches('/'));
		match Url::parse(&base).and_then(|base| base.join(path.trim_start_matches('/'))) {
			Ok(url) => url.into(),
			Err(err) => {
				warn!(target = "msgr.config", base_url = %self.site.base_url, path, error = %err, "cannot resolve site URL");
				path.to_string()
			}
		}
	}
}

fn non_empty(selector: Option<&str>) -> Option<&str> {
	selector.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn landmarks() -> Landmarks {
		let mut config = Config::default();
		config.site.base_url = "https://chat.example.com/".into();
		config.site.page_size = 25;
		config.site.conversation_list_body = Some(r#"{"limit":{pageSize}}"#.into());
		Landmarks::from_config(&config)
	}

	#[test]
	fn builds_site_urls() {
		let landmarks = landmarks();
		assert_eq!(landmarks.login_url(), "https://chat.example.com/login");
		assert_eq!(
			landmarks.conversation_list_url(),
			"https://chat.example.com/api/conversations?limit=25"
		);
		assert_eq!(landmarks.conversation_list_body().as_deref(), Some(r#"{"limit":25}"#));
	}

	#[test]
	fn conversation_target_is_encoded() {
		let landmarks = landmarks();
		assert_eq!(
			landmarks.conversation_url("team chat/42"),
			"https://chat.example.com/messages/team%20chat%2F42"
		);
		assert_eq!(landmarks.conversation_url("c-1_a.b~"), "https://chat.example.com/messages/c-1_a.b~");
	}

	#[test]
	fn base_path_prefix_is_kept() {
		let mut config = Config::default();
		config.site.base_url = "https://example.com/chat".into();
		config.site.login_path = "/login".into();
		let landmarks = Landmarks::from_config(&config);
		assert_eq!(landmarks.login_url(), "https://example.com/chat/login");
		assert_eq!(landmarks.conversation_url("c-1"), "https://example.com/chat/messages/c-1");

		config.site.login_path = "https://sso.example.com/auth".into();
		assert_eq!(Landmarks::from_config(&config).login_url(), "https://sso.example.com/auth");
	}

	#[test]
	fn attach_option_per_kind() {
		let landmarks = landmarks();
		assert_eq!(landmarks.attach_option(AttachmentKind::Text), None);
		assert_eq!(
			landmarks.attach_option(AttachmentKind::Image),
			Some("[data-testid=\"attach-image\"]")
		);
		assert_eq!(
			landmarks.attach_option(AttachmentKind::File),
			Some("[data-testid=\"attach-file\"]")
		);
	}

	#[test]
	fn blank_optional_selectors_are_unset() {
		let mut config = Config::default();
		config.selectors.step_up_prompt = Some("  ".into());
		config.selectors.login_error = Some(".error".into());
		let landmarks = Landmarks::from_config(&config);
		assert_eq!(landmarks.step_up_prompt(), None);
		assert_eq!(landmarks.login_error(), Some(".error"));
	}
}
