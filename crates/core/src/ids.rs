//! Time-derived identifiers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|elapsed| elapsed.as_millis() as u64)
		.unwrap_or_default()
}

/// Issues `<prefix>_<millis>` ids that are unique and strictly increasing
/// within the process, even when several are requested in the same millisecond.
#[derive(Debug)]
pub struct IdGenerator {
	prefix: &'static str,
	last: AtomicU64,
}

impl IdGenerator {
	pub const fn new(prefix: &'static str) -> Self {
		Self {
			prefix,
			last: AtomicU64::new(0),
		}
	}

	pub fn next(&self) -> String {
		format!("{}_{}", self.prefix, self.next_value())
	}

	/// Next raw value: the current time, or one past the previous value.
	pub fn next_value(&self) -> u64 {
		let now = now_ms();
		let previous = self
			.last
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(advance(last, now)))
			.unwrap_or_else(|last| last);
		advance(previous, now)
	}
}

fn advance(last: u64, now: u64) -> u64 {
	if now > last { now } else { last + 1 }
}
