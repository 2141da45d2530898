//! Configuration module for loading environment variables and settings.
//!
//! Every setting has a default that matches a stock Raspberry Pi deployment
//! (local Mosquitto broker, espeak installed, files served on port 8000), so
//! an empty environment yields a working configuration.

use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default broker host.
pub const DEFAULT_BROKER_HOST: &str = "localhost";

/// Default broker port (plain MQTT).
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Default MQTT client identifier.
pub const DEFAULT_CLIENT_ID: &str = "announce-bridge";

/// Topic the bridge listens on for announcement text.
pub const DEFAULT_INBOUND_TOPIC: &str = "display/announce/text";

/// Topic the bridge publishes artifact URLs to.
pub const DEFAULT_OUTBOUND_TOPIC: &str = "display/announce";

/// Default artifact server port.
pub const DEFAULT_HTTP_PORT: u16 = 8000;

/// Default artifact directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "announcements";

/// Default retention cap.
pub const DEFAULT_MAX_AUDIO_FILES: usize = 10;

/// Default primary engine executable.
pub const DEFAULT_PRIMARY_PROGRAM: &str = "espeak";

/// Default fallback engine interpreter.
pub const DEFAULT_FALLBACK_PROGRAM: &str = "python3";

/// Default speaking rate in words per minute.
pub const DEFAULT_SPEECH_RATE: u32 = 150;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// MQTT broker host name or address
    pub broker_host: String,
    /// MQTT broker port
    pub broker_port: u16,
    /// MQTT client identifier
    pub client_id: String,
    /// MQTT keep-alive interval
    pub keep_alive: Duration,
    /// Pause between reconnect attempts after a connection error
    pub reconnect_delay: Duration,
    /// Topic carrying announcement text
    pub inbound_topic: String,
    /// Topic receiving artifact URLs
    pub outbound_topic: String,
    /// Artifact server port
    pub http_port: u16,
    /// Host advertised in artifact URLs; auto-detected when `None`
    pub advertise_host: Option<String>,
    /// Directory holding generated artifacts
    pub output_dir: PathBuf,
    /// Retention cap for generated artifacts
    pub max_audio_files: usize,
    /// Primary (lightweight) engine executable
    pub primary_program: String,
    /// Hard timeout for the primary engine
    pub primary_timeout: Duration,
    /// Interpreter used to run the fallback engine
    pub fallback_program: String,
    /// Hard timeout for the fallback engine
    pub fallback_timeout: Duration,
    /// Delay before checking the fallback engine's output
    pub fallback_settle: Duration,
    /// Speaking rate in words per minute
    pub speech_rate: u32,
    /// Capacity of the queue between the MQTT event loop and the worker
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker_host: DEFAULT_BROKER_HOST.to_string(),
            broker_port: DEFAULT_BROKER_PORT,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            keep_alive: Duration::from_secs(60),
            reconnect_delay: Duration::from_millis(2000),
            inbound_topic: DEFAULT_INBOUND_TOPIC.to_string(),
            outbound_topic: DEFAULT_OUTBOUND_TOPIC.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            advertise_host: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_audio_files: DEFAULT_MAX_AUDIO_FILES,
            primary_program: DEFAULT_PRIMARY_PROGRAM.to_string(),
            primary_timeout: Duration::from_secs(15),
            fallback_program: DEFAULT_FALLBACK_PROGRAM.to_string(),
            fallback_timeout: Duration::from_secs(20),
            fallback_settle: Duration::from_millis(200),
            speech_rate: DEFAULT_SPEECH_RATE,
            queue_capacity: 16,
        }
    }
}

impl Config {
    /// Load configuration from environment variables and .env file.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` if a numeric variable is set but
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Unset keys fall back to the defaults. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            broker_host: get("MQTT_BROKER").unwrap_or(defaults.broker_host),
            broker_port: parse_or(&get, "MQTT_PORT", defaults.broker_port)?,
            client_id: get("MQTT_CLIENT_ID").unwrap_or(defaults.client_id),
            keep_alive: secs_or(&get, "MQTT_KEEP_ALIVE_SECS", defaults.keep_alive)?,
            reconnect_delay: millis_or(&get, "MQTT_RECONNECT_DELAY_MS", defaults.reconnect_delay)?,
            inbound_topic: get("MQTT_TOPIC_ANNOUNCE_TEXT").unwrap_or(defaults.inbound_topic),
            outbound_topic: get("MQTT_TOPIC_ANNOUNCE_URL").unwrap_or(defaults.outbound_topic),
            http_port: parse_or(&get, "HTTP_SERVER_PORT", defaults.http_port)?,
            advertise_host: get("ADVERTISE_HOST"),
            output_dir: get("AUDIO_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            max_audio_files: parse_or(&get, "MAX_AUDIO_FILES", defaults.max_audio_files)?,
            primary_program: get("ESPEAK_BIN").unwrap_or(defaults.primary_program),
            primary_timeout: secs_or(&get, "ESPEAK_TIMEOUT_SECS", defaults.primary_timeout)?,
            fallback_program: get("FALLBACK_PYTHON").unwrap_or(defaults.fallback_program),
            fallback_timeout: secs_or(&get, "FALLBACK_TIMEOUT_SECS", defaults.fallback_timeout)?,
            fallback_settle: millis_or(&get, "FALLBACK_SETTLE_MS", defaults.fallback_settle)?,
            speech_rate: parse_or(&get, "SPEECH_RATE", defaults.speech_rate)?,
            queue_capacity: parse_or(&get, "ANNOUNCE_QUEUE_CAPACITY", defaults.queue_capacity)?,
        })
    }

    /// Check cross-field constraints that parsing alone cannot catch.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` naming the first offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker_host.trim().is_empty() {
            return Err(ConfigError::invalid_value("MQTT_BROKER", "must not be empty"));
        }
        if self.inbound_topic.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "MQTT_TOPIC_ANNOUNCE_TEXT",
                "must not be empty",
            ));
        }
        if self.outbound_topic.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "MQTT_TOPIC_ANNOUNCE_URL",
                "must not be empty",
            ));
        }
        if self.inbound_topic == self.outbound_topic {
            return Err(ConfigError::invalid_value(
                "MQTT_TOPIC_ANNOUNCE_URL",
                "must differ from MQTT_TOPIC_ANNOUNCE_TEXT",
            ));
        }
        // MQTT carries keep-alive as a 16-bit number of seconds.
        if self.keep_alive.as_secs() > u64::from(u16::MAX) {
            return Err(ConfigError::invalid_value(
                "MQTT_KEEP_ALIVE_SECS",
                format!("must be at most {}", u16::MAX),
            ));
        }
        if self.max_audio_files == 0 {
            return Err(ConfigError::invalid_value("MAX_AUDIO_FILES", "must be at least 1"));
        }
        if self.primary_timeout.is_zero() {
            return Err(ConfigError::invalid_value("ESPEAK_TIMEOUT_SECS", "must be positive"));
        }
        if self.fallback_timeout.is_zero() {
            return Err(ConfigError::invalid_value("FALLBACK_TIMEOUT_SECS", "must be positive"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "ANNOUNCE_QUEUE_CAPACITY",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Broker address as `host:port`, for logs.
    pub fn broker_addr(&self) -> String {
        format!("{}:{}", self.broker_host, self.broker_port)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::invalid_value(key, format!("'{}': {}", raw, e))),
        None => Ok(default),
    }
}

fn secs_or<G>(get: &G, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    parse_or(get, key, default.as_secs()).map(Duration::from_secs)
}

fn millis_or<G>(get: &G, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    parse_or(get, key, default.as_millis() as u64).map(Duration::from_millis)
}
