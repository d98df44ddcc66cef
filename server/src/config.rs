//! Server configuration module.
//!
//! Parses configuration from environment variables for the NoteHub server.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `NOTEHUB_TOKEN_SECRET` | Yes | - | Token signing key, at least 32 bytes |
//! | `NOTEHUB_TOKEN_TTL_SECS` | No | 3600 | Token time-to-live in seconds |
//! | `PORT` | No | 8080 | HTTP server port |
//!
//! The signing key is process-wide state: it is read here once at startup
//! and injected into the components that need it. Rotation mid-process is
//! out of scope.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Default HTTP server port.
const DEFAULT_PORT: u16 = 8080;

/// Default token time-to-live (1 hour).
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Minimum accepted signing key length, in bytes.
const MIN_SECRET_LENGTH: usize = 32;

/// Errors that can occur when parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has invalid format.
    #[error("invalid format for {var}: {message}")]
    InvalidFormat {
        /// The offending variable.
        var: String,
        /// Why its value was rejected.
        message: String,
    },

    /// Port number is invalid.
    #[error("invalid port number: {0}")]
    InvalidPort(#[from] std::num::ParseIntError),

    /// Configuration validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Server configuration parsed from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Token signing key.
    pub token_secret: String,

    /// Time-to-live for issued tokens.
    pub token_ttl: Duration,

    /// HTTP server port.
    pub port: u16,
}

impl Config {
    /// Parse configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `NOTEHUB_TOKEN_SECRET` is missing or too
    /// short, or if `PORT`/`NOTEHUB_TOKEN_TTL_SECS` fail to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token_secret = env::var("NOTEHUB_TOKEN_SECRET")
            .map_err(|_| ConfigError::MissingEnvVar("NOTEHUB_TOKEN_SECRET".to_string()))?;
        let token_ttl = parse_token_ttl()?;
        let port = parse_port()?;

        let config = Self {
            token_secret,
            token_ttl,
            port,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.token_secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::ValidationError(format!(
                "NOTEHUB_TOKEN_SECRET must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }

        if self.token_ttl.is_zero() {
            return Err(ConfigError::ValidationError(
                "NOTEHUB_TOKEN_TTL_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse the PORT environment variable, defaulting when unset.
fn parse_port() -> Result<u16, ConfigError> {
    match env::var("PORT") {
        Ok(port_str) => Ok(port_str.parse()?),
        Err(env::VarError::NotPresent) => Ok(DEFAULT_PORT),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidFormat {
            var: "PORT".to_string(),
            message: "contains invalid unicode".to_string(),
        }),
    }
}

/// Parse the NOTEHUB_TOKEN_TTL_SECS environment variable, defaulting when
/// unset.
fn parse_token_ttl() -> Result<Duration, ConfigError> {
    match env::var("NOTEHUB_TOKEN_TTL_SECS") {
        Ok(ttl_str) => {
            let secs: u64 = ttl_str.parse().map_err(|_| ConfigError::InvalidFormat {
                var: "NOTEHUB_TOKEN_TTL_SECS".to_string(),
                message: format!("expected a number of seconds, got '{ttl_str}'"),
            })?;
            Ok(Duration::from_secs(secs))
        }
        Err(env::VarError::NotPresent) => Ok(Duration::from_secs(DEFAULT_TOKEN_TTL_SECS)),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidFormat {
            var: "NOTEHUB_TOKEN_TTL_SECS".to_string(),
            message: "contains invalid unicode".to_string(),
        }),
    }
}
