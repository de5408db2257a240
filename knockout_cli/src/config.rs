//! CLI configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use knockout::db::{self, DatabaseConfig};

/// Default `RUST_LOG` filter
pub const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn";

/// Complete CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Log filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl CliConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if `DATABASE_URL` is missing or a pool setting is not a number
    pub fn from_env(database_url_override: Option<String>) -> Result<Self, ConfigError> {
        Self::from_lookup(database_url_override, |name| std::env::var(name).ok())
    }

    fn from_lookup(
        database_url_override: Option<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let database = DatabaseConfig::from_lookup(|name| match (name, &database_url_override) {
            ("DATABASE_URL", Some(url)) => Some(url.clone()),
            _ => lookup(name),
        })?;

        let log_filter = lookup("KNOCKOUT_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            database,
            log_filter,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let db = &self.database;

        if db.max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if db.min_connections > db.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!("Must not exceed max connections ({})", db.max_connections),
            });
        }

        if db.connection_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_CONNECTION_TIMEOUT".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

impl From<db::ConfigError> for ConfigError {
    fn from(err: db::ConfigError) -> Self {
        match err {
            db::ConfigError::MissingRequired(var) => ConfigError::MissingRequired {
                var: var.to_string(),
                hint: "Set it in the environment, in .env, or pass --db-url".to_string(),
            },
            db::ConfigError::Invalid { name, value } => ConfigError::Invalid {
                var: name.to_string(),
                reason: format!("{value:?} is not a valid number"),
            },
        }
    }
}
