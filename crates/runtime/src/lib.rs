//! Minimal Chrome DevTools Protocol runtime.
//!
//! Provides browser launch/discovery, a multiplexed WebSocket connection
//! and page handles with the small set of element operations the session
//! service needs (navigate, wait, fill, click, read text, upload).

pub mod browser;
pub mod connection;
pub mod error;
pub mod launcher;
pub mod page;
pub mod transport;

pub use browser::{Browser, Cookie};
pub use connection::{Connection, DEFAULT_CALL_TIMEOUT};
pub use error::{Error, Result};
pub use launcher::{CdpVersionInfo, LaunchOptions};
pub use page::Page;
