//! # Database Connection Pool Management
//!
//! SQLite connection pool creation and monitoring.

use crate::config::DatabaseConfig;
use crate::errors::{AglbError, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Pool, Sqlite,
};
use std::{str::FromStr, time::Duration};

/// Type alias for the database connection pool
pub type DbPool = Pool<Sqlite>;

const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a database connection pool with the specified configuration
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    validate_config(config)?;

    // Every connection to `:memory:` opens its own database, so an in-memory
    // pool must never grow past one connection or drop it while idle.
    let (max_connections, min_connections) = if config.is_in_memory() {
        (1, 1)
    } else {
        (config.max_connections, config.min_connections)
    };

    let pool_options = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(min_connections)
        .acquire_timeout(config.connect_timeout())
        .test_before_acquire(true);

    let pool_options = if config.is_in_memory() {
        pool_options.idle_timeout(None).max_lifetime(None)
    } else {
        pool_options.idle_timeout(config.idle_timeout())
    };

    let connect_options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| {
            AglbError::database(
                e,
                format!("Invalid SQLite connection string: {}", sanitize_url(&config.url)),
            )
        })?
        .create_if_missing(true)
        .busy_timeout(SQLITE_BUSY_TIMEOUT)
        .foreign_keys(true);

    let connect_options = if config.is_in_memory() {
        connect_options
    } else {
        connect_options.journal_mode(SqliteJournalMode::Wal)
    };

    let pool = pool_options.connect_with(connect_options).await.map_err(|e| {
        tracing::error!(
            error = %e,
            url = %sanitize_url(&config.url),
            busy_timeout_ms = SQLITE_BUSY_TIMEOUT.as_millis(),
            "Failed to create SQLite database pool"
        );
        AglbError::database(
            e,
            format!("Failed to connect to database: {}", sanitize_url(&config.url)),
        )
    })?;

    tracing::info!(
        in_memory = config.is_in_memory(),
        max_connections = max_connections,
        min_connections = min_connections,
        connect_timeout_ms = config.connect_timeout().as_millis(),
        idle_timeout_ms = config.idle_timeout().map(|d| d.as_millis()),
        "Database connection pool created"
    );

    if config.auto_migrate {
        tracing::info!("Auto-migration enabled, running database migrations");
        crate::storage::migrations::run_migrations(&pool).await?;
    }

    Ok(pool)
}

/// Validate database configuration
fn validate_config(config: &DatabaseConfig) -> Result<()> {
    if config.max_connections == 0 {
        return Err(AglbError::config("max_connections must be greater than 0"));
    }

    if config.min_connections > config.max_connections {
        return Err(AglbError::config("min_connections cannot be greater than max_connections"));
    }

    if config.url.is_empty() {
        return Err(AglbError::config("database URL cannot be empty"));
    }

    if !config.is_sqlite() {
        return Err(AglbError::config("database URL must start with 'sqlite:'"));
    }

    Ok(())
}

/// Sanitize database URL for logging (remove credentials and query options)
fn sanitize_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) if parsed.password().is_some() || !parsed.username().is_empty() => format!(
            "{}://***:***@{}{}",
            parsed.scheme(),
            parsed.host_str().unwrap_or("unknown"),
            parsed.path()
        ),
        Ok(parsed) if parsed.query().is_some() => {
            let mut stripped = parsed.clone();
            stripped.set_query(None);
            stripped.to_string()
        }
        _ => url.to_string(),
    }
}

/// Get pool statistics for monitoring
pub fn get_pool_stats(pool: &DbPool) -> PoolStats {
    PoolStats { size: pool.size(), idle: pool.num_idle() }
}

/// Pool statistics for monitoring
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Total connections in the pool
    pub size: u32,
    /// Number of idle connections
    pub idle: usize,
}

impl PoolStats {
    /// Get the number of active connections
    pub fn active(&self) -> u32 {
        self.size.saturating_sub(self.idle as u32)
    }

    /// Check if the pool is healthy (has available connections)
    pub fn is_healthy(&self) -> bool {
        self.size > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> DatabaseConfig {
        DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 3,
            min_connections: 1,
            auto_migrate: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_config_valid() {
        let config = DatabaseConfig {
            url: "sqlite://./test.db".to_string(),
            max_connections: 10,
            min_connections: 2,
            ..Default::default()
        };

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_config_invalid_max_connections() {
        let config = DatabaseConfig { max_connections: 0, ..Default::default() };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_invalid_min_max() {
        let config =
            DatabaseConfig { max_connections: 5, min_connections: 10, ..Default::default() };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_rejects_other_databases() {
        let config =
            DatabaseConfig { url: "postgresql://localhost/aglb".to_string(), ..Default::default() };
        assert!(validate_config(&config).is_err());

        let config = DatabaseConfig { url: String::new(), ..Default::default() };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_sanitize_url() {
        assert_eq!(sanitize_url("sqlite://./test.db"), "sqlite://./test.db");
        assert_eq!(sanitize_url("sqlite://./test.db?mode=rwc"), "sqlite://./test.db");
        assert_eq!(sanitize_url("invalid-url"), "invalid-url");
    }

    #[test]
    fn test_pool_stats() {
        let stats = PoolStats { size: 10, idle: 3 };
        assert_eq!(stats.active(), 7);
        assert!(stats.is_healthy());

        let empty_stats = PoolStats { size: 0, idle: 0 };
        assert_eq!(empty_stats.active(), 0);
        assert!(!empty_stats.is_healthy());
    }

    #[tokio::test]
    async fn test_memory_pool_keeps_a_single_connection() {
        let pool = create_pool(&memory_config()).await.unwrap();
        let stats = get_pool_stats(&pool);
        assert!(stats.is_healthy());
        assert_eq!(stats.size, 1);
    }

    #[tokio::test]
    async fn test_create_pool_invalid_config() {
        let config = DatabaseConfig { max_connections: 0, ..memory_config() };
        assert!(create_pool(&config).await.is_err());
    }
}
