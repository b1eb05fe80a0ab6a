//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Database connection URL; the in-memory store is used when absent
    pub database_url: Option<String>,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Attempts per command when appends keep conflicting
    pub append_max_retries: u32,

    /// Base backoff between conflicting appends (multiplied by attempt)
    pub append_retry_backoff_ms: u64,

    /// Deliveries of one event before a failing follow-up is given up
    pub redelivery_max_attempts: u32,

    /// Base delay before a failed follow-up is delivered again (multiplied by attempt)
    pub redelivery_backoff_ms: u64,

    /// Age after which an unresolved transfer is reported as stalled
    pub stalled_transfer_secs: u64,

    /// Interval between maintenance runs, never zero
    pub monitor_interval_secs: u64,

    /// How long processed-event keys are kept for deduplication
    pub idempotency_retention_secs: u64,

    /// Environment (development, production)
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 10,
            append_max_retries: 3,
            append_retry_backoff_ms: 50,
            redelivery_max_attempts: 5,
            redelivery_backoff_ms: 200,
            stalled_transfer_secs: 300,
            monitor_interval_secs: 60,
            idempotency_retention_secs: 86_400,
            environment: "development".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        Ok(Self {
            database_url,
            database_max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            append_max_retries: parse_var("APPEND_MAX_RETRIES", defaults.append_max_retries)?,
            append_retry_backoff_ms: parse_var(
                "APPEND_RETRY_BACKOFF_MS",
                defaults.append_retry_backoff_ms,
            )?,
            redelivery_max_attempts: parse_var(
                "REDELIVERY_MAX_ATTEMPTS",
                defaults.redelivery_max_attempts,
            )?,
            redelivery_backoff_ms: parse_var(
                "REDELIVERY_BACKOFF_MS",
                defaults.redelivery_backoff_ms,
            )?,
            stalled_transfer_secs: parse_var(
                "STALLED_TRANSFER_SECS",
                defaults.stalled_transfer_secs,
            )?,
            monitor_interval_secs: parse_nonzero(
                "MONITOR_INTERVAL_SECS",
                defaults.monitor_interval_secs,
            )?,
            idempotency_retention_secs: parse_var(
                "IDEMPOTENCY_RETENTION_SECS",
                defaults.idempotency_retention_secs,
            )?,
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        })
    }

    pub fn append_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.append_retry_backoff_ms)
    }

    pub fn redelivery_backoff(&self) -> Duration {
        Duration::from_millis(self.redelivery_backoff_ms)
    }

    pub fn stalled_transfer_after(&self) -> Duration {
        Duration::from_secs(self.stalled_transfer_secs)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    pub fn idempotency_retention(&self) -> Duration {
        Duration::from_secs(self.idempotency_retention_secs)
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(name)),
        Err(_) => Ok(default),
    }
}

fn parse_nonzero(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match parse_var(name, default)? {
        0 => Err(ConfigError::InvalidValue(name)),
        value => Ok(value),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.database_url.is_none());
        assert_eq!(config.append_max_retries, 3);
        assert_eq!(config.append_retry_backoff(), Duration::from_millis(50));
        assert_eq!(config.stalled_transfer_after(), Duration::from_secs(300));
        assert_eq!(config.redelivery_max_attempts, 5);
        assert_eq!(config.redelivery_backoff(), Duration::from_millis(200));
        assert_eq!(config.environment, "development");
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        // Variable name unique to this test so parallel tests don't collide
        env::set_var("ACCOUNT_TRANSFER_TEST_RETRIES", "many");
        let result: Result<u32, _> = parse_var("ACCOUNT_TRANSFER_TEST_RETRIES", 3);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue("ACCOUNT_TRANSFER_TEST_RETRIES"))
        ));
        env::remove_var("ACCOUNT_TRANSFER_TEST_RETRIES");
    }

    #[test]
    fn test_parse_nonzero_rejects_zero() {
        env::set_var("ACCOUNT_TRANSFER_TEST_INTERVAL", "0");
        assert!(matches!(
            parse_nonzero("ACCOUNT_TRANSFER_TEST_INTERVAL", 60),
            Err(ConfigError::InvalidValue("ACCOUNT_TRANSFER_TEST_INTERVAL"))
        ));

        env::set_var("ACCOUNT_TRANSFER_TEST_INTERVAL", "15");
        assert_eq!(parse_nonzero("ACCOUNT_TRANSFER_TEST_INTERVAL", 60).unwrap(), 15);
        env::remove_var("ACCOUNT_TRANSFER_TEST_INTERVAL");
    }

    #[test]
    fn test_zero_monitor_interval_is_rejected() {
        // Only test that touches MONITOR_INTERVAL_SECS
        env::set_var("MONITOR_INTERVAL_SECS", "0");
        let result = Config::from_env();
        env::remove_var("MONITOR_INTERVAL_SECS");

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue("MONITOR_INTERVAL_SECS"))
        ));
    }

    #[test]
    fn test_parse_var_uses_default_when_unset() {
        let result: u64 = parse_var("ACCOUNT_TRANSFER_TEST_UNSET", 42).unwrap();
        assert_eq!(result, 42);
    }
}
