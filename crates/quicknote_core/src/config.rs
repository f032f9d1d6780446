//! Store configuration from environment variables.
//!
//! # Responsibility
//! - Decide which backend (if any) a store should try.
//! - Validate tunables before any connection is attempted.
//!
//! # Invariants
//! - An absent backend is a valid configuration, not an error.
//! - A half-configured REST backend degrades to "no backend" with a warning.

use crate::repo::rest_table::RestTableConfig;
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable names.
pub mod env_vars {
    pub const BACKEND_URL: &str = "QUICKNOTE_BACKEND_URL";
    pub const BACKEND_KEY: &str = "QUICKNOTE_BACKEND_KEY";
    pub const BACKEND_TABLE: &str = "QUICKNOTE_BACKEND_TABLE";
    pub const DB_PATH: &str = "QUICKNOTE_DB_PATH";
    pub const CALL_TIMEOUT_MS: &str = "QUICKNOTE_CALL_TIMEOUT_MS";
}

/// Default values.
pub mod defaults {
    pub const BACKEND_TABLE: &str = "notes";
    pub const CALL_TIMEOUT_MS: u64 = 5_000;
}

/// Which backend to try at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Memory-only store.
    None,
    /// PostgREST-compatible remote table.
    Rest(RestTableConfig),
    /// Local SQLite database file.
    Sqlite { path: PathBuf },
}

/// Resolved store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: BackendConfig,
    /// Budget for one backend call (probe included) before it is treated
    /// as failed.
    pub call_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::None,
            call_timeout: Duration::from_millis(defaults::CALL_TIMEOUT_MS),
        }
    }
}

impl StoreConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`. Blank values count as unset.
    ///
    /// # Errors
    /// - `InvalidTimeout` when the timeout is not a positive integer.
    /// - `InvalidUrl` when the backend URL lacks an http(s) scheme.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let call_timeout = match read(env_vars::CALL_TIMEOUT_MS) {
            Some(raw) => parse_timeout(&raw)?,
            None => Duration::from_millis(defaults::CALL_TIMEOUT_MS),
        };

        let backend = match (read(env_vars::BACKEND_URL), read(env_vars::BACKEND_KEY)) {
            (Some(url), Some(api_key)) => {
                validate_url(&url)?;
                BackendConfig::Rest(RestTableConfig {
                    base_url: url,
                    api_key,
                    table: read(env_vars::BACKEND_TABLE)
                        .unwrap_or_else(|| defaults::BACKEND_TABLE.to_string()),
                    timeout: call_timeout,
                })
            }
            (Some(_), None) | (None, Some(_)) => {
                warn!(
                    "event=config_load module=config status=degraded reason=incomplete_backend required={},{}",
                    env_vars::BACKEND_URL,
                    env_vars::BACKEND_KEY
                );
                sqlite_or_none(read(env_vars::DB_PATH))
            }
            (None, None) => sqlite_or_none(read(env_vars::DB_PATH)),
        };

        Ok(Self {
            backend,
            call_timeout,
        })
    }
}

fn sqlite_or_none(path: Option<String>) -> BackendConfig {
    match path {
        Some(path) => BackendConfig::Sqlite {
            path: PathBuf::from(path),
        },
        None => BackendConfig::None,
    }
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.parse::<u64>() {
        Ok(0) | Err(_) => Err(ConfigError::InvalidTimeout(raw.to_string())),
        Ok(millis) => Ok(Duration::from_millis(millis)),
    }
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl(url.to_string()))
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidTimeout(String),
    InvalidUrl(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTimeout(value) => write!(
                f,
                "{} must be a positive integer of milliseconds, got `{value}`",
                env_vars::CALL_TIMEOUT_MS
            ),
            Self::InvalidUrl(value) => write!(
                f,
                "{} must start with http:// or https://, got `{value}`",
                env_vars::BACKEND_URL
            ),
        }
    }
}

impl Error for ConfigError {}
