//! Authenticated session lifecycle.

mod login;
mod manager;

pub use manager::{ScopedContext, SessionManager};
