//! Fetch-and-save of the remote conversation list.

use std::sync::Arc;

use msgr_protocol::SnapshotOutcome;
use tracing::{info, warn};

use super::parse::parse_conversation_page;
use super::store::SnapshotStore;
use crate::config::Timeouts;
use crate::driver::FetchRequest;
use crate::error::{Error, Result};
use crate::landmarks::Landmarks;
use crate::session::SessionManager;

/// Longest slice of an error body quoted back in [`Error::Upstream`].
const UPSTREAM_EXCERPT_CHARS: usize = 200;

pub struct SnapshotEngine {
	session: Arc<SessionManager>,
	store: Arc<SnapshotStore>,
	landmarks: Arc<Landmarks>,
	timeouts: Timeouts,
}

impl SnapshotEngine {
	pub fn new(session: Arc<SessionManager>, store: Arc<SnapshotStore>, landmarks: Arc<Landmarks>, timeouts: Timeouts) -> Self {
		Self {
			session,
			store,
			landmarks,
			timeouts,
		}
	}

	/// Fetches one page of the conversation list and stores it as a snapshot.
	pub async fn fetch_and_save(&self) -> Result<SnapshotOutcome> {
		self.session.ensure_ready().await?;

		let request = self.list_request();
		let url = request.url.clone();
		let response = self.session.fetch(request).await?;
		if !response.is_success() {
			warn!(target = "msgr.snapshot", url = %url, status = response.status, "conversation list request failed");
			return Err(Error::Upstream {
				status: response.status,
				message: excerpt(&response.body),
			});
		}

		let page = parse_conversation_page(&response.body)?;
		let id = self.store.save(page.items.clone());
		info!(
			target = "msgr.snapshot",
			id = %id,
			count = page.items.len(),
			has_more = page.has_more,
			"snapshot captured"
		);

		Ok(SnapshotOutcome {
			id,
			items: page.items,
			has_more: page.has_more,
		})
	}

	fn list_request(&self) -> FetchRequest {
		let site = self.landmarks.site();
		FetchRequest {
			url: self.landmarks.conversation_list_url(),
			method: site.conversation_list_method.clone(),
			headers: site
				.conversation_list_headers
				.iter()
				.map(|(name, value)| (name.clone(), value.clone()))
				.collect(),
			body: self.landmarks.conversation_list_body(),
			timeout: self.timeouts.fetch(),
		}
	}
}

fn excerpt(body: &str) -> String {
	let trimmed = body.trim();
	match trimmed.char_indices().nth(UPSTREAM_EXCERPT_CHARS) {
		Some((cut, _)) => format!("{}…", &trimmed[..cut]),
		None => trimmed.to_string(),
	}
}
