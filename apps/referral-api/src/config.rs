//! API server configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//! Only the database path is required.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use referral_db::{DbConfig, SettingsDefaults};
use referral_engine::EngineConfig;

/// HTTP port.
pub const ENV_HTTP_PORT: &str = "REFERRAL_HTTP_PORT";
/// SQLite database file.
pub const ENV_DATABASE_PATH: &str = "REFERRAL_DATABASE_PATH";
/// Pool size.
pub const ENV_DB_MAX_CONNECTIONS: &str = "REFERRAL_DB_MAX_CONNECTIONS";
/// Default discount written when settings are first created, e.g. "10.00".
pub const ENV_DEFAULT_DISCOUNT: &str = "REFERRAL_DEFAULT_DISCOUNT";
/// Default commission written when settings are first created.
pub const ENV_DEFAULT_COMMISSION: &str = "REFERRAL_DEFAULT_COMMISSION";
/// Attempts at finding a free generated code.
pub const ENV_CODE_ATTEMPTS: &str = "REFERRAL_CODE_ATTEMPTS";

/// Referral API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// HTTP server port
    pub http_port: u16,

    /// SQLite database path
    pub database_path: PathBuf,

    /// Max pooled connections
    pub db_max_connections: u32,

    /// Seed rates for the settings row
    pub seed_settings: SettingsDefaults,

    /// Generated-code collision budget
    pub code_generation_attempts: u32,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_env_map(&env::vars().collect())
    }

    /// Load configuration from an explicit variable map.
    pub fn from_env_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let database_path = get(ENV_DATABASE_PATH)
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingRequired(ENV_DATABASE_PATH.to_string()))?;

        let defaults = SettingsDefaults::default();
        let config = ApiConfig {
            http_port: parse_or(get(ENV_HTTP_PORT), ENV_HTTP_PORT, 8080)?,
            database_path,
            db_max_connections: parse_or(get(ENV_DB_MAX_CONNECTIONS), ENV_DB_MAX_CONNECTIONS, 5)?,
            seed_settings: SettingsDefaults {
                discount: parse_or(get(ENV_DEFAULT_DISCOUNT), ENV_DEFAULT_DISCOUNT, defaults.discount)?,
                commission: parse_or(
                    get(ENV_DEFAULT_COMMISSION),
                    ENV_DEFAULT_COMMISSION,
                    defaults.commission,
                )?,
            },
            code_generation_attempts: parse_or(
                get(ENV_CODE_ATTEMPTS),
                ENV_CODE_ATTEMPTS,
                EngineConfig::default().code_generation_attempts,
            )?,
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue(ENV_DB_MAX_CONNECTIONS.to_string()));
        }
        if config.code_generation_attempts == 0 {
            return Err(ConfigError::InvalidValue(ENV_CODE_ATTEMPTS.to_string()));
        }

        Ok(config)
    }

    /// Database settings for the pool.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone()).max_connections(self.db_max_connections)
    }

    /// Engine settings.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .code_generation_attempts(self.code_generation_attempts)
            .seed_settings(self.seed_settings)
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<&str>, key: &str, default: T) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
