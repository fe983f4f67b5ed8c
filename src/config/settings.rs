//! # Configuration Settings
//!
//! Defines the configuration structure for the AGLB service.

use crate::errors::{AglbError, Result};
use crate::validation::primitives::is_valid_domain_format;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// Server configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Database configuration
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,

    /// Loadbalancer domain settings
    #[validate(nested)]
    pub aglb: AglbConfig,
}

impl AppConfig {
    /// Build the configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config = Self {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env(),
            observability: ObservabilityConfig::from_env(),
            aglb: AglbConfig::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(AglbError::from)?;
        self.validate_custom()?;
        Ok(())
    }

    /// Cross-field rules the validator derive cannot express
    fn validate_custom(&self) -> Result<()> {
        if !self.database.is_sqlite() {
            return Err(AglbError::config("Database URL must start with 'sqlite:'"));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(AglbError::config(
                "Database min_connections cannot exceed max_connections",
            ));
        }

        if !is_valid_domain_format(&self.aglb.base_domain) {
            return Err(AglbError::config(format!(
                "AGLB base domain '{}' is not a valid domain",
                self.aglb.base_domain
            )));
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Server bind address
    #[validate(length(min = 1, message = "Host cannot be empty"))]
    pub host: String,

    /// Server port
    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub timeout_seconds: u64,

    /// Maximum request body size in bytes
    #[validate(range(min = 1024, message = "Max body size must be at least 1KB"))]
    pub max_body_size: usize,

    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
            enable_cors: false,
        }
    }
}

impl ServerConfig {
    /// Get the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Create ServerConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let host = std::env::var("AGLB_API_HOST").unwrap_or(defaults.host);

        let port = match std::env::var("AGLB_API_PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|e| {
                AglbError::config_with_source(format!("Invalid AGLB_API_PORT '{}'", raw), Box::new(e))
            })?,
            Err(_) => defaults.port,
        };

        let timeout_seconds = std::env::var("AGLB_API_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.timeout_seconds);

        let max_body_size = std::env::var("AGLB_API_MAX_BODY_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.max_body_size);

        let enable_cors = std::env::var("AGLB_API_ENABLE_CORS")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(defaults.enable_cors);

        Ok(Self { host, port, timeout_seconds, max_body_size, enable_cors })
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[validate(range(min = 0, max = 50, message = "Min connections must be between 0 and 50"))]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 = no timeout)
    pub idle_timeout_seconds: u64,

    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/aglb.db".to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600, // 10 minutes
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get idle timeout as Duration (None if 0)
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_seconds))
        }
    }

    /// Check if this is a SQLite configuration
    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }

    /// In-memory SQLite databases vanish with their last connection
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    /// Create DatabaseConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let url = std::env::var("DATABASE_URL").unwrap_or(defaults.url);

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(defaults.max_connections);

        let min_connections = std::env::var("DATABASE_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(defaults.min_connections);

        let connect_timeout_seconds = std::env::var("DATABASE_CONNECT_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.connect_timeout_seconds);

        let idle_timeout_seconds = std::env::var("DATABASE_IDLE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.idle_timeout_seconds);

        let auto_migrate = std::env::var("DATABASE_AUTO_MIGRATE")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(defaults.auto_migrate);

        Self {
            url,
            max_connections,
            min_connections,
            connect_timeout_seconds,
            idle_timeout_seconds,
            auto_migrate,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Service name attached to log records
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "aglb".to_string(),
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}

impl ObservabilityConfig {
    /// Create ObservabilityConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: std::env::var("AGLB_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: std::env::var("AGLB_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logging: std::env::var("AGLB_JSON_LOGGING")
                .map(|s| s.to_lowercase() == "true" || s == "1")
                .unwrap_or(defaults.json_logging),
        }
    }
}

/// Loadbalancer domain settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AglbConfig {
    /// Suffix of derived loadbalancer hostnames
    #[validate(length(min = 1, max = 200, message = "Base domain must be 1-200 characters"))]
    pub base_domain: String,
}

impl Default for AglbConfig {
    fn default() -> Self {
        Self { base_domain: "lb.example.net".to_string() }
    }
}

impl AglbConfig {
    pub fn from_env() -> Self {
        Self {
            base_domain: std::env::var("AGLB_BASE_DOMAIN")
                .map(|s| s.trim().to_ascii_lowercase())
                .unwrap_or_else(|_| Self::default().base_domain),
        }
    }
}
