//! Wire types for the msgr session service.
//!
//! This crate holds the serde-serializable shapes exchanged between the
//! session core and whatever request layer fronts it (the bundled HTTP
//! server, the CLI, or an embedding application).
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization and small accessors
//! - **camelCase on the wire**: Matches the JSON the HTTP surface emits
//! - **Stable**: Changes only when the external contract changes
//!
//! Validation, state transitions and I/O live in `msgr-core`.

pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod session;

pub use conversation::*;
pub use dispatch::*;
pub use error::*;
pub use session::*;
