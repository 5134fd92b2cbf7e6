//! Database and pool settings.
//!
//! Settings come from a TOML document or from `DATABASE_*` environment
//! variables. Missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable prefix for every setting.
pub const ENV_PREFIX: &str = "DATABASE_";

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Connections kept open.
    pub pool_size: u32,
    /// Extra connections allowed above `pool_size` under load.
    pub max_overflow: u32,
    /// Seconds to wait for a free connection before failing.
    pub pool_timeout: u64,
    /// Seconds after which a connection is closed and replaced.
    pub pool_recycle: u64,
    /// Ping idle connections before handing them out.
    pub pool_pre_ping: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            pool_size: 5,
            max_overflow: 5,
            pool_timeout: 30,
            pool_recycle: 360,
            pool_pre_ping: true,
        }
    }
}

impl PoolSettings {
    pub fn max_connections(&self) -> u32 {
        self.pool_size.saturating_add(self.max_overflow).max(1)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_timeout)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.pool_recycle)
    }
}

/// Top-level database settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Driver-qualified URL (`sqlite://app.db?mode=rwc`, `postgres://..`).
    pub url: String,
    /// Log every executed statement.
    pub echo: bool,
    pub pool: PoolSettings,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://sqlward.db?mode=rwc".to_string(),
            echo: false,
            pool: PoolSettings::default(),
        }
    }
}

impl DatabaseSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool.pool_size = pool_size;
        self
    }

    /// Parse settings from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which receives full variable names
    /// such as `DATABASE_URL`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(url) = get("URL") {
            settings.url = url;
        }
        if let Some(echo) = get("ECHO") {
            settings.echo = parse_bool("ECHO", &echo)?;
        }
        if let Some(v) = get("POOL_SIZE") {
            settings.pool.pool_size = parse_num("POOL_SIZE", &v)?;
        }
        if let Some(v) = get("MAX_OVERFLOW") {
            settings.pool.max_overflow = parse_num("MAX_OVERFLOW", &v)?;
        }
        if let Some(v) = get("POOL_TIMEOUT") {
            settings.pool.pool_timeout = parse_num("POOL_TIMEOUT", &v)?;
        }
        if let Some(v) = get("POOL_RECYCLE") {
            settings.pool.pool_recycle = parse_num("POOL_RECYCLE", &v)?;
        }
        if let Some(v) = get("POOL_PRE_PING") {
            settings.pool.pool_pre_ping = parse_bool("POOL_PRE_PING", &v)?;
        }

        Ok(settings)
    }
}

fn invalid(name: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: format!("{ENV_PREFIX}{name}"),
        value: value.to_string(),
    }
}

fn parse_num<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(name, value))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(name, value)),
    }
}
