//! In-memory snapshot store.

use std::sync::Arc;

use msgr_protocol::{ConversationSummary, Snapshot};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::ids::{IdGenerator, now_ms};

/// Append-only (plus delete) store of immutable snapshots.
///
/// Entries are kept in insertion order; readers receive clones.
pub struct SnapshotStore {
	entries: RwLock<Vec<Arc<Snapshot>>>,
	ids: IdGenerator,
}

impl Default for SnapshotStore {
	fn default() -> Self {
		Self::new()
	}
}

impl SnapshotStore {
	pub fn new() -> Self {
		Self {
			entries: RwLock::new(Vec::new()),
			ids: IdGenerator::new("snap"),
		}
	}

	/// Stores `items` as a new snapshot and returns its id.
	pub fn save(&self, items: Vec<ConversationSummary>) -> String {
		self.save_at(items, now_ms())
	}

	/// Like [`save`](Self::save) with an explicit `saved_at`.
	pub fn save_at(&self, items: Vec<ConversationSummary>, saved_at: u64) -> String {
		let id = self.ids.next();
		let snapshot = Arc::new(Snapshot::new(id.clone(), items, saved_at));
		let mut entries = self.entries.write();
		entries.push(snapshot);
		debug!(target = "msgr.snapshot", id = %id, stored = entries.len(), "snapshot saved");
		id
	}

	pub fn get(&self, id: &str) -> Result<Snapshot> {
		self.entries
			.read()
			.iter()
			.find(|snapshot| snapshot.id == id)
			.map(|snapshot| Snapshot::clone(snapshot))
			.ok_or_else(|| Error::NotFound(id.to_string()))
	}

	/// All snapshots, newest `saved_at` first; ties go to the later insert.
	pub fn list_all(&self) -> Vec<Snapshot> {
		let mut ordered: Vec<Arc<Snapshot>> = self.entries.read().iter().rev().cloned().collect();
		// Stable sort keeps reverse-insertion order among equal timestamps.
		ordered.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
		ordered.into_iter().map(|snapshot| Snapshot::clone(&snapshot)).collect()
	}

	/// Newest snapshot; [`Error::Empty`] when nothing is stored.
	pub fn latest(&self) -> Result<Snapshot> {
		self.entries
			.read()
			.iter()
			.max_by_key(|snapshot| snapshot.saved_at)
			.map(|snapshot| Snapshot::clone(snapshot))
			.ok_or(Error::Empty)
	}

	pub fn delete(&self, id: &str) -> Result<()> {
		let mut entries = self.entries.write();
		let index = entries
			.iter()
			.position(|snapshot| snapshot.id == id)
			.ok_or_else(|| Error::NotFound(id.to_string()))?;
		entries.remove(index);
		debug!(target = "msgr.snapshot", id, stored = entries.len(), "snapshot deleted");
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}
