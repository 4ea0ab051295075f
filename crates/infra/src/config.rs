//! Environment-driven configuration.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `USE_PERSISTENT_STORES` | `false` | Use Postgres instead of the in-memory store |
//! | `DATABASE_URL` | none | Required when persistent |
//! | `DATABASE_MAX_CONNECTIONS` | `10` | Pool size |
//! | `LOW_STOCK_THRESHOLD` | `10` | Default low-stock threshold for reports |

use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::info;

use brewhouse_inventory::DEFAULT_LOW_STOCK_THRESHOLD;

use crate::error::{StoreError, map_sqlx_error};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Knobs for the read-side reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingConfig {
    pub low_stock_threshold: Decimal,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub reporting: ReportingConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            use_persistent_stores: false,
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            reporting: ReportingConfig::default(),
        }
    }
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let use_persistent_stores = parse_or("USE_PERSISTENT_STORES", lookup("USE_PERSISTENT_STORES"), false)?;
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        let max_connections = parse_or(
            "DATABASE_MAX_CONNECTIONS",
            lookup("DATABASE_MAX_CONNECTIONS"),
            DEFAULT_MAX_CONNECTIONS,
        )?;
        let low_stock_threshold = parse_or(
            "LOW_STOCK_THRESHOLD",
            lookup("LOW_STOCK_THRESHOLD"),
            DEFAULT_LOW_STOCK_THRESHOLD,
        )?;

        Ok(Self {
            use_persistent_stores,
            database_url,
            max_connections,
            reporting: ReportingConfig { low_stock_threshold },
        })
    }

    /// Open a Postgres pool from `DATABASE_URL`.
    pub async fn connect(&self) -> Result<PgPool, StoreError> {
        let url = self.database_url.as_deref().ok_or_else(|| StoreError::Unavailable {
            operation: "connect".to_string(),
            message: "DATABASE_URL is not set".to_string(),
        })?;
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        info!(max_connections = self.max_connections, "connected to postgres");
        Ok(pool)
    }
}
