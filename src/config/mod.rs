//! Configuration management for the wallet auth server
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).

use std::env;
use std::net::IpAddr;
use std::str::FromStr;

use thiserror::Error;

use crate::auth::{ChecksumPolicy, MAX_SESSION_TTL_DAYS};

/// Default session lifetime: 6 hours
const DEFAULT_SESSION_TTL_SECONDS: i64 = 6 * 60 * 60;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }
}

impl Environment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Which backend holds user records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Memory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    Hasura {
        endpoint: String,
        admin_secret: Option<String>,
    },
}

impl StoreConfig {
    /// Human-readable description with credentials masked, for logging
    pub fn describe(&self) -> String {
        match self {
            StoreConfig::Memory => "memory".to_string(),
            StoreConfig::Postgres { database_url, .. } => {
                format!("postgres ({})", mask_database_url(database_url))
            }
            StoreConfig::Hasura { endpoint, .. } => format!("hasura ({})", endpoint),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Current environment
    pub environment: Environment,

    /// Bind address
    pub host: IpAddr,

    /// Server port
    pub port: u16,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// CORS allowed origins, comma separated
    pub cors_allowed_origins: Option<String>,

    /// JWT secret for session signing
    pub jwt_secret: String,

    /// Session token TTL in seconds (default: 21600 = 6 hours)
    pub session_ttl_seconds: i64,

    /// Casing rule for claimed addresses
    pub checksum_policy: ChecksumPolicy,

    /// User record backend
    pub store: StoreConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .map(|s| s.parse::<Environment>())
            .transpose()?
            .unwrap_or_default();

        let host = lookup("HOST")
            .unwrap_or_else(|| "127.0.0.1".to_string())
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidValue("HOST must be an IP address".to_string()))?;

        let port = lookup("PORT")
            .unwrap_or_else(|| "3030".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS").filter(|s| !s.is_empty());

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?;

        let session_ttl_seconds = match lookup("SESSION_TTL_SECONDS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|ttl| *ttl > 0 && *ttl <= MAX_SESSION_TTL_DAYS * 24 * 60 * 60)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(format!(
                        "SESSION_TTL_SECONDS must be between 1 and {} days in seconds, got '{}'",
                        MAX_SESSION_TTL_DAYS, raw
                    ))
                })?,
            None => DEFAULT_SESSION_TTL_SECONDS,
        };

        let checksum_policy = lookup("ADDRESS_CHECKSUM_POLICY")
            .map(|s| s.parse::<ChecksumPolicy>())
            .transpose()
            .map_err(ConfigError::InvalidValue)?
            .unwrap_or_default();

        let store = if let Some(endpoint) = lookup("HASURA_URI") {
            StoreConfig::Hasura {
                endpoint,
                admin_secret: lookup("HASURA_ADMIN_SECRET"),
            }
        } else if let Some(database_url) = lookup("DATABASE_URL") {
            let max_connections = lookup("DB_MAX_CONNECTIONS")
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(5);
            StoreConfig::Postgres {
                database_url,
                max_connections,
            }
        } else {
            StoreConfig::Memory
        };

        if environment.is_production() && store == StoreConfig::Memory {
            return Err(ConfigError::InvalidValue(
                "production requires HASURA_URI or DATABASE_URL".to_string(),
            ));
        }

        Ok(Config {
            environment,
            host,
            port,
            log_level,
            cors_allowed_origins,
            jwt_secret,
            session_ttl_seconds,
            checksum_policy,
            store,
        })
    }
}

/// Mask the password in a database URL for logging
fn mask_database_url(database_url: &str) -> String {
    if let Some(at_pos) = database_url.find('@') {
        if let Some(colon_pos) = database_url[..at_pos].rfind(':') {
            let prefix = &database_url[..colon_pos + 1];
            let suffix = &database_url[at_pos..];
            return format!("{}****{}", prefix, suffix);
        }
    }
    database_url.to_string()
}
