//! Error types for the announcement bridge.
//!
//! This module provides a unified error hierarchy using `thiserror` for consistent
//! error handling across the bridge crates.
//!
//! # Error Categories
//!
//! - `ConfigError`: Invalid configuration values
//! - `Error::Validation`: Malformed announcement input (blank or non-UTF-8 text)
//! - `Error::EngineUnavailable`: A speech engine executable could not be found
//! - `Error::Engine`: A speech engine ran but failed or produced no audio
//! - `Error::Timeout`: A speech engine exceeded its time budget
//! - `Error::SynthesisFailed`: Every configured engine failed for one announcement
//! - `Error::Broker`: MQTT broker errors
//! - `ServerError`: Artifact server startup and transport failures

use thiserror::Error;

/// Unified error type for the announcement bridge.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors (invalid values)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// File system I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The engine executable is not installed or not on `PATH`
    #[error("Speech engine '{engine}' is not available")]
    EngineUnavailable {
        /// Engine name
        engine: String,
    },

    /// The engine ran but did not produce a usable artifact
    #[error("Speech engine '{engine}' failed: {message}")]
    Engine {
        /// Engine name
        engine: String,
        /// Failure description, usually the engine's stderr
        message: String,
    },

    /// The engine did not finish within its timeout
    #[error("Speech engine '{engine}' timed out after {seconds} seconds")]
    Timeout {
        /// Engine name
        engine: String,
        /// Configured timeout in whole seconds
        seconds: u64,
    },

    /// All engines failed for a single announcement
    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Broker connection or protocol errors
    #[error("Broker error: {0}")]
    Broker(String),
}

impl Error {
    /// Create a new validation error.
    ///
    /// # Example
    ///
    /// ```
    /// use announce_common::error::Error;
    ///
    /// let err = Error::validation("announcement text is empty");
    /// assert!(err.to_string().contains("announcement text is empty"));
    /// ```
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Create an engine-unavailable error.
    pub fn engine_unavailable(engine: impl Into<String>) -> Self {
        Error::EngineUnavailable {
            engine: engine.into(),
        }
    }

    /// Create a new engine failure error.
    ///
    /// # Example
    ///
    /// ```
    /// use announce_common::error::Error;
    ///
    /// let err = Error::engine("espeak", "exit status 1");
    /// assert!(err.to_string().contains("espeak"));
    /// assert!(err.to_string().contains("exit status 1"));
    /// ```
    pub fn engine(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Engine {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    ///
    /// # Example
    ///
    /// ```
    /// use announce_common::error::Error;
    ///
    /// let err = Error::timeout("pyttsx3", 20);
    /// assert!(err.to_string().contains("20 seconds"));
    /// ```
    pub fn timeout(engine: impl Into<String>, seconds: u64) -> Self {
        Error::Timeout {
            engine: engine.into(),
            seconds,
        }
    }

    /// Create a synthesis failure summarising every attempt.
    pub fn synthesis_failed(summary: impl Into<String>) -> Self {
        Error::SynthesisFailed(summary.into())
    }

    /// Create a new broker error.
    pub fn broker(message: impl Into<String>) -> Self {
        Error::Broker(message.into())
    }

    /// Whether the error means the engine binary is missing rather than broken.
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(self, Error::EngineUnavailable { .. })
    }
}

/// Configuration errors.
///
/// These errors occur when loading or validating configuration from
/// environment variables or the command line.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl ConfigError {
    /// Create a new invalid value error.
    pub fn invalid_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue(name.into(), reason.into())
    }
}

/// Errors that can occur when running the artifact server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified port
    #[error("Failed to bind to port {port}: {message}")]
    BindFailed { port: u16, message: String },

    /// Transport error while serving
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the unified Error type.
pub type Result<T> = std::result::Result<T, Error>;
