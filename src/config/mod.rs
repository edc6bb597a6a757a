use std::env;
use std::str::FromStr;

use crate::store::retry::RetryConfig;

/// Configuration loading failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {var}")]
    Invalid { var: &'static str, value: String },
}

/// Backend used for pattern configuration and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Redis,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "redis" => Ok(Self::Redis),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(other.to_string()),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub run_migrations: bool,
    /// Where patterns live. Redis is only valid for counters.
    pub pattern_backend: StorageBackend,
    pub counter_backend: StorageBackend,
    pub redis_url: String,
    pub host: String,
    pub port: u16,
    pub counter_retry: RetryConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let pattern_backend = match env::var("STORAGE_BACKEND") {
            Ok(v) => parse_backend("STORAGE_BACKEND", &v)?,
            Err(_) => StorageBackend::Postgres,
        };
        if pattern_backend == StorageBackend::Redis {
            return Err(ConfigError::Invalid {
                var: "STORAGE_BACKEND",
                value: "redis".to_string(),
            });
        }

        let counter_backend = match env::var("COUNTER_BACKEND") {
            Ok(v) => parse_backend("COUNTER_BACKEND", &v)?,
            Err(_) => pattern_backend,
        };

        let database_url = env::var("DATABASE_URL").ok();
        let needs_database = pattern_backend == StorageBackend::Postgres
            || counter_backend == StorageBackend::Postgres;
        if needs_database && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let retry_default = RetryConfig::default();

        Ok(Self {
            database_url,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            run_migrations: env::var("RUN_MIGRATIONS")
                .map(|v| !matches!(v.trim(), "0" | "false" | "no"))
                .unwrap_or(true),
            pattern_backend,
            counter_backend,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("BACKEND_PORT", 3000)?,
            counter_retry: RetryConfig {
                max_retries: parse_var("COUNTER_MAX_RETRIES", retry_default.max_retries)?,
                initial_delay_ms: parse_var(
                    "COUNTER_RETRY_INITIAL_MS",
                    retry_default.initial_delay_ms,
                )?,
                max_delay_ms: parse_var("COUNTER_RETRY_MAX_MS", retry_default.max_delay_ms)?,
            },
        })
    }

    /// Configuration for a process that keeps everything in memory.
    pub fn in_memory() -> Self {
        Self {
            database_url: None,
            database_max_connections: 0,
            run_migrations: false,
            pattern_backend: StorageBackend::Memory,
            counter_backend: StorageBackend::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            counter_retry: RetryConfig::default(),
        }
    }
}

/// Read `var`, falling back to `default` only when it is unset.
fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => parse_value(var, &value),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}

fn parse_backend(var: &'static str, value: &str) -> Result<StorageBackend, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parsing_accepts_aliases() {
        assert_eq!("postgres".parse::<StorageBackend>(), Ok(StorageBackend::Postgres));
        assert_eq!("PG".parse::<StorageBackend>(), Ok(StorageBackend::Postgres));
        assert_eq!(" Redis ".parse::<StorageBackend>(), Ok(StorageBackend::Redis));
        assert_eq!("in-memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
    }

    #[test]
    fn backend_parsing_rejects_unknown() {
        let err = parse_backend("STORAGE_BACKEND", "mongo").unwrap_err();
        assert_eq!(err.to_string(), "Invalid value 'mongo' for STORAGE_BACKEND");
    }

    #[test]
    fn numeric_values_must_parse() {
        let err = parse_value::<u16>("BACKEND_PORT", "notaport").unwrap_err();
        assert_eq!(err.to_string(), "Invalid value 'notaport' for BACKEND_PORT");

        let err = parse_value::<usize>("COUNTER_MAX_RETRIES", "-3").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "COUNTER_MAX_RETRIES", .. }));

        assert_eq!(parse_value::<u64>("COUNTER_RETRY_MAX_MS", " 500 ").unwrap(), 500);
    }

    #[test]
    fn unset_variables_take_defaults() {
        let port: u16 = parse_var("IDALLOC_TEST_UNSET_PORT", 3000).unwrap();
        assert_eq!(port, 3000);
    }

    #[test]
    fn from_env_rejects_invalid_port() {
        // The only test in this crate that writes BACKEND_PORT.
        std::env::set_var("STORAGE_BACKEND", "memory");
        std::env::set_var("BACKEND_PORT", "notaport");
        let err = AppConfig::from_env().unwrap_err();
        std::env::remove_var("BACKEND_PORT");
        std::env::remove_var("STORAGE_BACKEND");
        assert!(matches!(err, ConfigError::Invalid { var: "BACKEND_PORT", .. }));
    }

    #[test]
    fn in_memory_config_needs_no_database() {
        let config = AppConfig::in_memory();
        assert!(config.database_url.is_none());
        assert_eq!(config.pattern_backend, StorageBackend::Memory);
        assert_eq!(config.counter_backend, StorageBackend::Memory);
    }
}
