//! Environment-sourced service configuration.
//!
//! All settings are read once at startup into an immutable [`Config`] that is
//! passed explicitly to the components that need it. Nothing reads the
//! environment after startup.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

/// Default directory for dedup record files.
const DEFAULT_DATA_DIR: &str = "chat-records";

/// Default delay between scheduling a dispatch and performing it, in
/// milliseconds. Decouples the outbound call from the inbound request.
const DEFAULT_DISPATCH_DELAY_MS: u64 = 100;

/// Default retention for dedup records, in hours (30 days).
const DEFAULT_DEDUPE_TTL_HOURS: i64 = 720;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable is set but cannot be parsed.
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Immutable service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord webhook URL receiving the rendered messages.
    pub sink_url: String,

    /// Port the HTTP server listens on.
    pub port: u16,

    /// Directory holding one record file per seen fingerprint.
    pub data_dir: PathBuf,

    /// Delay applied before each outbound dispatch.
    pub dispatch_delay_ms: u64,

    /// Retention for dedup records. Zero disables the retention sweep.
    pub dedupe_ttl_hours: i64,
}

impl Config {
    /// Loads configuration from the environment.
    ///
    /// `WEBHOOK_URL` and `APPLICATION_PORT` are required; the rest have
    /// defaults. Fails with [`ConfigError`] on a missing or unparseable value.
    pub fn from_env() -> Result<Config, ConfigError> {
        let sink_url = require("WEBHOOK_URL")?;
        let port = parse_var("APPLICATION_PORT", require("APPLICATION_PORT")?)?;

        let data_dir = env::var("CHAT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));

        let dispatch_delay_ms = match env::var("DISPATCH_DELAY_MS") {
            Ok(value) => parse_var("DISPATCH_DELAY_MS", value)?,
            Err(_) => DEFAULT_DISPATCH_DELAY_MS,
        };

        let dedupe_ttl_hours = match env::var("DEDUPE_TTL_HOURS") {
            Ok(value) => parse_var("DEDUPE_TTL_HOURS", value)?,
            Err(_) => DEFAULT_DEDUPE_TTL_HOURS,
        };

        Ok(Config {
            sink_url,
            port,
            data_dir,
            dispatch_delay_ms,
            dedupe_ttl_hours,
        })
    }
}

/// Reads a required environment variable.
fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

/// Parses an environment variable value, reporting the offending text on failure.
fn parse_var<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}
