//! CLI command implementations.

pub mod config;
pub mod prompt;
pub mod serve;
pub mod session;
