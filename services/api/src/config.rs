//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use classroom_cache_core::CURRENT_CACHE_VERSION;
use regex::Regex;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where cache entries are kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStoreKind {
    Postgres,
    Memory,
}

impl FromStr for CacheStoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue(
                "CACHE_STORE".to_string(),
                format!("'{}' is not one of 'postgres' or 'memory'", other),
            )),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cache_version: String,
    pub cache_store: CacheStoreKind,
    /// When set, snapshots are read from fixture files in this directory
    /// instead of from imported snapshots in Postgres.
    pub snapshot_fixtures_path: Option<PathBuf>,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Cache Settings ---
        let cache_version = parse_cache_version(
            &std::env::var("CACHE_VERSION").unwrap_or_else(|_| CURRENT_CACHE_VERSION.to_string()),
        )?;

        let cache_store = std::env::var("CACHE_STORE")
            .map(|s| s.parse::<CacheStoreKind>())
            .unwrap_or(Ok(CacheStoreKind::Postgres))?;

        let snapshot_fixtures_path = std::env::var("SNAPSHOT_FIXTURES_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cache_version,
            cache_store,
            snapshot_fixtures_path,
            cors_origin,
        })
    }
}

/// Accepts `MAJOR.MINOR.PATCH` with an optional pre-release suffix.
pub fn parse_cache_version(raw: &str) -> Result<String, ConfigError> {
    let pattern = Regex::new(r"^\d+\.\d+\.\d+(-[0-9A-Za-z.-]+)?$")
        .map_err(|e| ConfigError::InvalidValue("CACHE_VERSION".to_string(), e.to_string()))?;

    let version = raw.trim();
    if pattern.is_match(version) {
        Ok(version.to_string())
    } else {
        Err(ConfigError::InvalidValue(
            "CACHE_VERSION".to_string(),
            format!("'{}' is not a semantic version", raw),
        ))
    }
}
