//! Shared authenticated chat session.
//!
//! One long-lived, logged-in browser context serves many concurrent
//! callers. [`ChatService`] is the entry point:
//!
//! - [`ChatService::dispatch_message`] sends a message on an isolated page
//! - [`ChatService::fetch_and_save_snapshot`] captures the conversation list
//! - snapshot lookups read the in-memory [`SnapshotStore`]
//!
//! The session logs in lazily and re-authenticates after it is found to be
//! expired. The browser is reached through the [`driver`] traits;
//! [`driver::CdpDriver`] is the production implementation.

pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod ids;
pub mod landmarks;
pub mod service;
pub mod session;
pub mod snapshot;

pub use config::Config;
pub use dispatch::DispatchEngine;
pub use error::{Error, Result};
pub use landmarks::Landmarks;
pub use msgr_protocol as protocol;
pub use service::ChatService;
pub use session::{ScopedContext, SessionManager};
pub use snapshot::{SnapshotEngine, SnapshotStore};
