//! Runtime configuration loaded from environment variables.

use std::{fmt::Display, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

const DEFAULT_DATABASE_URL: &str = "sqlite://solar-admin.db";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_AUTH_ENTRY_PATH: &str = "/auth";
const DEFAULT_VALIDATION_TIMEOUT_SECS: u64 = 10;
const DEFAULT_ROLE_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_SESSION_TTL_HOURS: u64 = 24;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Server-authoritative endpoint the guard asks for an admin verdict.
    pub admin_validate_url: Url,
    /// Where denied visitors are sent; reason codes are appended as query parameters.
    pub auth_entry_path: String,
    pub admin_validation_timeout: Duration,
    pub role_cache_ttl: Duration,
    pub session_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Missing keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host: String = load(&lookup, "HOST", DEFAULT_HOST.to_string())?;
        let port: u16 = load(&lookup, "PORT", DEFAULT_PORT)?;

        let admin_validate_url = match lookup("ADMIN_VALIDATE_URL") {
            Some(raw) => parse_value("ADMIN_VALIDATE_URL", &raw)?,
            None => default_validate_url(&host, port)?,
        };

        let auth_entry_path: String =
            load(&lookup, "AUTH_ENTRY_PATH", DEFAULT_AUTH_ENTRY_PATH.to_string())?;
        if !auth_entry_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                key: "AUTH_ENTRY_PATH",
                message: format!("'{auth_entry_path}' must start with '/'"),
            });
        }

        let timeout_secs: u64 = load(
            &lookup,
            "ADMIN_VALIDATION_TIMEOUT_SECS",
            DEFAULT_VALIDATION_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "ADMIN_VALIDATION_TIMEOUT_SECS",
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            database_url: load(&lookup, "DATABASE_URL", DEFAULT_DATABASE_URL.to_string())?,
            host,
            port,
            admin_validate_url,
            auth_entry_path,
            admin_validation_timeout: Duration::from_secs(timeout_secs),
            role_cache_ttl: Duration::from_secs(load(
                &lookup,
                "ROLE_CACHE_TTL_SECS",
                DEFAULT_ROLE_CACHE_TTL_SECS,
            )?),
            session_ttl: Duration::from_secs(
                load(&lookup, "SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?.saturating_mul(3600),
            ),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_validate_url(host: &str, port: u16) -> Result<Url, ConfigError> {
    parse_value(
        "ADMIN_VALIDATE_URL",
        &format!("http://{host}:{port}/api/admin/validate"),
    )
}

fn load<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => {
            debug!("{key} set from environment");
            parse_value(key, &raw)
        }
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}
