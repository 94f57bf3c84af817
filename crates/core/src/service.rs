//! Facade composing the session, dispatch and snapshot engines.

use std::sync::Arc;
use std::time::Duration;

use msgr_protocol::{DispatchRequest, DispatchResult, SessionHealth, Snapshot, SnapshotOutcome, SnapshotQuery};
use tracing::info;

use crate::config::Config;
use crate::dispatch::DispatchEngine;
use crate::driver::{CdpDriver, Driver};
use crate::error::Result;
use crate::landmarks::Landmarks;
use crate::session::SessionManager;
use crate::snapshot::{SnapshotEngine, SnapshotStore};

/// Entry point shared by every request handler.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct ChatService {
	session: Arc<SessionManager>,
	dispatcher: DispatchEngine,
	snapshots: SnapshotEngine,
	store: Arc<SnapshotStore>,
}

impl ChatService {
	pub fn new(driver: Arc<dyn Driver>, config: &Config) -> Self {
		let landmarks = Arc::new(Landmarks::from_config(config));
		let session = Arc::new(SessionManager::new(
			driver,
			Arc::clone(&landmarks),
			config.credentials.clone(),
			config.timeouts.clone(),
		));
		let store = Arc::new(SnapshotStore::new());
		let dispatcher = DispatchEngine::new(Arc::clone(&session), Arc::clone(&landmarks), config.timeouts.clone());
		let snapshots = SnapshotEngine::new(
			Arc::clone(&session),
			Arc::clone(&store),
			landmarks,
			config.timeouts.clone(),
		);
		Self {
			session,
			dispatcher,
			snapshots,
			store,
		}
	}

	/// Builds a service driving a real browser over CDP.
	pub fn from_config(config: &Config) -> Self {
		let poll = Duration::from_millis(config.timeouts.poll_interval_ms);
		let driver = CdpDriver::new(config.browser.clone(), poll);
		Self::new(Arc::new(driver), config)
	}

	pub fn session(&self) -> &Arc<SessionManager> {
		&self.session
	}

	pub fn store(&self) -> &Arc<SnapshotStore> {
		&self.store
	}

	pub async fn ensure_session_ready(&self) -> Result<SessionHealth> {
		self.session.ensure_ready().await?;
		Ok(self.session.health())
	}

	/// Never fails: every failure is reported inside the result.
	pub async fn dispatch_message(&self, request: &DispatchRequest) -> DispatchResult {
		self.dispatcher.dispatch(request).await
	}

	pub async fn fetch_and_save_snapshot(&self) -> Result<SnapshotOutcome> {
		self.snapshots.fetch_and_save().await
	}

	/// One snapshot by id, or every snapshot (newest first) without one.
	pub fn get_snapshot(&self, id: Option<&str>) -> Result<SnapshotQuery> {
		match id {
			Some(id) => self.store.get(id).map(SnapshotQuery::One),
			None => Ok(SnapshotQuery::All(self.store.list_all())),
		}
	}

	pub fn latest_snapshot(&self) -> Result<Snapshot> {
		self.store.latest()
	}

	pub fn delete_snapshot(&self, id: &str) -> Result<()> {
		self.store.delete(id)
	}

	pub fn session_health(&self) -> SessionHealth {
		self.session.health()
	}

	pub async fn shutdown(&self) {
		info!(target = "msgr.session", "shutting down session");
		self.session.teardown().await;
	}
}
