//! Configuration management for the server.

use converge_engine::SyncOptions;
use std::env;
use std::path::PathBuf;

/// Credentials and location of a remote schema store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Base URL of the store's REST API
    pub url: String,
    pub app_id: String,
    pub master_key: String,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// JSON file with the schema declarations
    pub schema_path: PathBuf,
    /// Remote store; `None` runs against an in-process store
    pub store: Option<StoreConfig>,
    /// Stages of the startup reconciliation
    pub sync: SyncOptions,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let schema_path = lookup("SCHEMA_PATH")
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingSchemaPath)?;

        let store = match lookup("STORE_URL") {
            Some(url) => Some(StoreConfig {
                url: url.trim_end_matches('/').to_string(),
                app_id: lookup("STORE_APP_ID").ok_or(ConfigError::Missing("STORE_APP_ID"))?,
                master_key: lookup("STORE_MASTER_KEY")
                    .ok_or(ConfigError::Missing("STORE_MASTER_KEY"))?,
            }),
            None => None,
        };

        let sync = SyncOptions {
            reset: parse_flag(&lookup, "CONVERGE_RESET", false)?,
            sync: parse_flag(&lookup, "CONVERGE_SYNC", true)?,
        };

        Ok(Self {
            host,
            port,
            schema_path,
            store,
            sync,
        })
    }
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag(key)),
        },
    }
}

/// Configuration errors.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("SCHEMA_PATH environment variable is required")]
    MissingSchemaPath,

    #[error("{0} is required when STORE_URL is set")]
    Missing(&'static str),

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid boolean value for {0}")]
    InvalidFlag(&'static str),
}
