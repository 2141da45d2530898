//! HUB75 Announce Common Library
//!
//! Shared utilities for configuration, error handling, tracing and shutdown
//! signalling across the announcement bridge crates.

pub mod config;
pub mod error;
pub mod shutdown;
pub mod tracing;

#[cfg(test)]
mod shutdown_test;

pub use config::Config;
pub use error::{ConfigError, Error, Result, ServerError};
pub use shutdown::{Shutdown, ShutdownListener, shutdown_channel, wait_for_shutdown_signal};
