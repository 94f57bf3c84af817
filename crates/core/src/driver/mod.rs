//! Automation driver seam.
//!
//! The session core only talks to the browser through these traits:
//!
//! - [`Driver`] launches one authenticated-capable [`AutomationContext`]
//! - [`AutomationContext`] hands out isolated [`Scope`]s that share its
//!   cookies and storage, and performs raw authenticated fetches
//! - [`Scope`] is a page-like unit with its own navigation
//!
//! [`cdp::CdpDriver`] implements them over the Chrome DevTools Protocol;
//! tests substitute an in-memory driver.

pub mod cdp;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use cdp::CdpDriver;

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Driver-level failure, classified for the session core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
	#[error("timeout after {ms}ms waiting for {what}")]
	Timeout { what: String, ms: u64 },

	/// The page, context or browser connection is gone.
	#[error("context closed: {0}")]
	ContextClosed(String),

	/// The remote site no longer treats the context as logged in.
	#[error("unauthenticated: {0}")]
	Unauthenticated(String),

	#[error("element not found: {0}")]
	ElementNotFound(String),

	#[error("navigation failed: {0}")]
	Navigation(String),

	/// The browser could not be launched or reached.
	#[error("unavailable: {0}")]
	Unavailable(String),

	#[error("{0}")]
	Failed(String),
}

impl DriverError {
	/// True when the failure means the authenticated context can no longer be used.
	pub fn is_auth_loss(&self) -> bool {
		matches!(self, DriverError::ContextClosed(_) | DriverError::Unauthenticated(_))
	}

	pub fn is_timeout(&self) -> bool {
		matches!(self, DriverError::Timeout { .. })
	}
}

/// Raw HTTP request issued through the authenticated context.
#[derive(Debug, Clone)]
pub struct FetchRequest {
	pub url: String,
	pub method: String,
	pub headers: Vec<(String, String)>,
	pub body: Option<String>,
	pub timeout: Duration,
}

/// Raw HTTP response.
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
	pub status: u16,
	pub headers: Vec<(String, String)>,
	pub body: String,
}

impl FetchResponse {
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// 401/403: the remote rejected our session cookies.
	pub fn is_auth_failure(&self) -> bool {
		matches!(self.status, 401 | 403)
	}
}

/// Launches automation contexts.
#[async_trait]
pub trait Driver: Send + Sync {
	async fn launch(&self) -> DriverResult<Arc<dyn AutomationContext>>;
}

/// Long-lived browser context owned by the session manager.
#[async_trait]
pub trait AutomationContext: Send + Sync {
	/// Opens an isolated page sharing this context's cookies and storage.
	async fn open_scope(&self) -> DriverResult<Box<dyn Scope>>;

	/// Performs a raw HTTP request carrying this context's credentials.
	async fn fetch(&self, request: FetchRequest) -> DriverResult<FetchResponse>;

	async fn close(&self) -> DriverResult<()>;
}

/// Page-like unit with independent navigation.
#[async_trait]
pub trait Scope: Send + Sync {
	async fn navigate(&self, url: &str, timeout: Duration) -> DriverResult<()>;

	/// Waits until `selector` is visible, failing with [`DriverError::Timeout`].
	async fn wait_for(&self, selector: &str, timeout: Duration) -> DriverResult<()>;

	/// Single non-blocking visibility probe.
	async fn is_visible(&self, selector: &str) -> DriverResult<bool>;

	async fn fill(&self, selector: &str, text: &str) -> DriverResult<()>;

	async fn click(&self, selector: &str) -> DriverResult<()>;

	async fn read_text(&self, selector: &str) -> DriverResult<String>;

	async fn set_input_files(&self, selector: &str, files: &[PathBuf]) -> DriverResult<()>;

	async fn close(&self) -> DriverResult<()>;
}
