//! Command line and HTTP front end for the msgr session service.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod server;
