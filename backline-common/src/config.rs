//! Service configuration
//!
//! Configuration is resolved once at process start from command-line
//! arguments and environment variables (`BACKLINE_PORT`,
//! `BACKLINE_DATABASE_URL`, `BACKLINE_SERVICE_KEY`), validated eagerly, and
//! passed down by value. Missing required values fail startup instead of
//! deferring the error to first access.

use crate::{Error, Result};

/// Validated service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port
    pub port: u16,
    /// sqlx connection string (e.g. `sqlite://backline.db?mode=rwc`)
    pub database_url: String,
    /// Bearer token required on authenticated API routes.
    /// Empty string disables authentication.
    pub service_key: String,
}

impl Config {
    /// Build and validate a configuration.
    pub fn new(port: u16, database_url: String, service_key: String) -> Result<Self> {
        let config = Self {
            port,
            database_url,
            service_key,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate required fields. Called from `new`; callers constructing the
    /// struct directly should invoke this before use.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(Error::Config(
                "database_url must not be empty (set BACKLINE_DATABASE_URL)".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(Error::Config("port must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Whether bearer authentication is enabled for API routes.
    pub fn auth_enabled(&self) -> bool {
        !self.service_key.is_empty()
    }
}
