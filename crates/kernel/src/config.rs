//! Configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Default number of rows per page when a request carries no usable `length`.
pub const DEFAULT_PAGE_LENGTH: u64 = 50;

/// Upper bound on rows per page.
pub const MAX_PAGE_LENGTH: u64 = 1000;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Rows per page when the request does not say (default: 50).
    pub default_page_length: u64,

    /// Rows per page are capped to this (default: 1000).
    pub max_page_length: u64,

    /// Per-statement timeout for count and fetch queries (default: 10s).
    pub statement_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let default_page_length = env::var("TABLE_DEFAULT_PAGE_LENGTH")
            .unwrap_or_else(|_| DEFAULT_PAGE_LENGTH.to_string())
            .parse()
            .context("TABLE_DEFAULT_PAGE_LENGTH must be a valid u64")?;

        let max_page_length = env::var("TABLE_MAX_PAGE_LENGTH")
            .unwrap_or_else(|_| MAX_PAGE_LENGTH.to_string())
            .parse()
            .context("TABLE_MAX_PAGE_LENGTH must be a valid u64")?;

        let statement_timeout_secs: u64 = env::var("STATEMENT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("STATEMENT_TIMEOUT_SECS must be a valid u64")?;

        Ok(Self {
            database_url,
            database_max_connections,
            default_page_length,
            max_page_length,
            statement_timeout: Duration::from_secs(statement_timeout_secs),
        })
    }

    /// Paging limits derived from this configuration.
    pub fn page_limits(&self) -> PageLimits {
        PageLimits::new(self.default_page_length, self.max_page_length)
    }
}

/// Paging defaults applied while normalizing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Used when `length` is missing, malformed or not positive.
    pub default_length: u64,
    /// Larger `length` values are capped to this.
    pub max_length: u64,
}

impl PageLimits {
    /// Create limits. A zero default is bumped to 1 and the maximum is never
    /// below the default.
    pub fn new(default_length: u64, max_length: u64) -> Self {
        let default_length = default_length.max(1);
        Self {
            default_length,
            max_length: max_length.max(default_length),
        }
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_LENGTH, MAX_PAGE_LENGTH)
    }
}
