//! Application configuration management.
//!
//! Configuration is read once at startup from environment variables (and an
//! optional `.env` file) and then passed by reference to every component that
//! needs it. The `envy` crate deserializes the environment into a type-safe struct.

use std::{fmt, time::Duration};

use serde::Deserialize;

use crate::error::StartupError;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `ATLAS_URI` (required): MongoDB connection string
/// - `STRIPE_PRIVATE_KEY` (required): payment provider secret key
/// - `PORT` (optional): HTTP server port, defaults to 5050
/// - `ALLOWED_ORIGIN` (optional): the single origin allowed by CORS
/// - `PUBLIC_DIR` (optional): directory served for unmatched paths
///
/// The remaining fields tune the middleware pipeline and the database
/// bootstrap; every one of them has a default.
#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    pub atlas_uri: String,

    pub stripe_private_key: String,

    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,

    #[serde(default = "default_public_dir")]
    pub public_dir: String,

    /// Database used when `ATLAS_URI` does not name one.
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Whether the security-header stage is part of the pipeline.
    #[serde(default = "default_true")]
    pub security_headers: bool,

    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: u32,

    /// Key rate-limit counters by the first `X-Forwarded-For` hop instead of
    /// the peer address. Only enable this behind a trusted reverse proxy.
    #[serde(default)]
    pub trust_proxy: bool,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,

    #[serde(default = "default_db_connect_attempts")]
    pub db_connect_attempts: u32,

    #[serde(default = "default_db_connect_timeout_ms")]
    pub db_connect_timeout_ms: u64,
}

/// Default port if PORT environment variable is not set.
fn default_port() -> u16 {
    5050
}

fn default_allowed_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_public_dir() -> String {
    "public".to_string()
}

fn default_database_name() -> String {
    "test".to_string()
}

fn default_true() -> bool {
    true
}

/// Ten minutes.
fn default_rate_limit_window_secs() -> u64 {
    10 * 60
}

fn default_rate_limit_max() -> u32 {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// 100 KiB, the usual JSON body cap.
fn default_body_limit_bytes() -> usize {
    100 * 1024
}

fn default_db_connect_attempts() -> u32 {
    5
}

fn default_db_connect_timeout_ms() -> u64 {
    10_000
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `ATLAS_URI` or `STRIPE_PRIVATE_KEY` is missing or blank
    /// - An environment variable value cannot be parsed into its expected type
    pub fn from_env() -> Result<Self, StartupError> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        Self::from_iter(std::env::vars())
    }

    /// Build configuration from explicit key/value pairs.
    ///
    /// Keys use the same names as the environment (`PORT`, `ATLAS_URI`, ...).
    pub fn from_iter<I>(vars: I) -> Result<Self, StartupError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        // Field names are matched case-insensitively: atlas_uri <- ATLAS_URI
        let config = envy::from_iter::<_, Config>(vars).map_err(|err| match err {
            envy::Error::MissingValue(name) => StartupError::ConfigurationMissing(name.to_uppercase()),
            other => StartupError::InvalidConfiguration(other.to_string()),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), StartupError> {
        if self.atlas_uri.trim().is_empty() {
            return Err(StartupError::ConfigurationMissing("ATLAS_URI".to_string()));
        }
        if self.stripe_private_key.trim().is_empty() {
            return Err(StartupError::ConfigurationMissing(
                "STRIPE_PRIVATE_KEY".to_string(),
            ));
        }
        if self.rate_limit_window_secs == 0 || self.rate_limit_max == 0 {
            return Err(StartupError::InvalidConfiguration(
                "RATE_LIMIT_WINDOW_SECS and RATE_LIMIT_MAX must be greater than zero".to_string(),
            ));
        }
        if self.db_connect_attempts == 0 {
            return Err(StartupError::InvalidConfiguration(
                "DB_CONNECT_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn db_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.db_connect_timeout_ms)
    }
}

// Hand-written so the database credentials and payment secret never reach the logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("atlas_uri", &"<redacted>")
            .field("stripe_private_key", &"<redacted>")
            .field("allowed_origin", &self.allowed_origin)
            .field("public_dir", &self.public_dir)
            .field("database_name", &self.database_name)
            .field("security_headers", &self.security_headers)
            .field("rate_limit_window_secs", &self.rate_limit_window_secs)
            .field("rate_limit_max", &self.rate_limit_max)
            .field("trust_proxy", &self.trust_proxy)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("body_limit_bytes", &self.body_limit_bytes)
            .field("db_connect_attempts", &self.db_connect_attempts)
            .field("db_connect_timeout_ms", &self.db_connect_timeout_ms)
            .finish()
    }
}
