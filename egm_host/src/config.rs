//! Host configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use egm_core::{Money, RecoveryConfig, StorageConfig};

/// Complete host configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Persisted store configuration
    pub storage: StorageConfig,
    /// Cash-out recovery configuration
    pub recovery: RecoveryConfig,
    /// Read key-off commands from stdin
    pub operator_console: bool,
}

impl HostConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `large_payout_limit_override` - Optional payout limit override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if `DATABASE_URL` is missing and not overridden
    pub fn from_env(
        database_url_override: Option<String>,
        large_payout_limit_override: Option<Money>,
    ) -> Result<Self, ConfigError> {
        let database_url = database_url_override
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .ok_or_else(|| ConfigError::MissingRequired {
                var: "DATABASE_URL".to_string(),
                hint: "Pass --db-url or set DATABASE_URL=postgres://user@host/egm_store"
                    .to_string(),
            })?;

        let storage = StorageConfig {
            database_url,
            ..StorageConfig::from_env()
        };

        let mut recovery = RecoveryConfig::from_env();
        if let Some(limit) = large_payout_limit_override {
            recovery.large_payout_limit = limit;
        }

        Ok(HostConfig {
            storage,
            recovery,
            operator_console: parse_env_or("OPERATOR_CONSOLE", true),
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.storage.database_url.starts_with("postgres://")
            && !self.storage.database_url.starts_with("postgresql://")
        {
            return Err(ConfigError::Invalid {
                var: "DATABASE_URL".to_string(),
                reason: "Must be a postgres:// connection string".to_string(),
            });
        }

        if self.storage.max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.storage.min_connections > self.storage.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.storage.max_connections
                ),
            });
        }

        if self.recovery.large_payout_limit <= 0 {
            return Err(ConfigError::Invalid {
                var: "LARGE_PAYOUT_LIMIT".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.recovery.ledger_capacity_warning == 0 {
            return Err(ConfigError::Invalid {
                var: "LEDGER_CAPACITY_WARNING".to_string(),
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

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HostConfig {
        HostConfig {
            storage: StorageConfig::development(),
            recovery: RecoveryConfig::default(),
            operator_console: false,
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "DATABASE_URL".to_string(),
            hint: "Pass --db-url".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("DATABASE_URL"));
        assert!(msg.contains("Pass --db-url"));
    }

    #[test]
    fn test_override_wins_over_env() {
        let config = HostConfig::from_env(
            Some("postgres://egm@localhost/override".to_string()),
            Some(500_000),
        )
        .unwrap();
        assert_eq!(config.storage.database_url, "postgres://egm@localhost/override");
        assert_eq!(config.recovery.large_payout_limit, 500_000);
    }

    #[test]
    fn test_development_config_is_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_non_postgres_url() {
        let mut config = config();
        config.storage.database_url = "mysql://localhost/egm".to_string();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "DATABASE_URL"));
    }

    #[test]
    fn test_config_validation_pool_bounds() {
        let mut config = config();
        config.storage.min_connections = 20;
        config.storage.max_connections = 4;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "DB_MIN_CONNECTIONS"));
    }

    #[test]
    fn test_config_validation_payout_limit() {
        let mut config = config();
        config.recovery.large_payout_limit = 0;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "LARGE_PAYOUT_LIMIT"));
    }
}
