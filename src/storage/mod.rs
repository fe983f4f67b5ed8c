//! # Storage and Persistence
//!
//! Database connectivity and the persistence layer for committed
//! loadbalancer graphs and certificates.

pub mod memory;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod sqlite;

pub use crate::config::DatabaseConfig;

pub use memory::InMemoryStore;
pub use migrations::{
    get_migration_version, list_applied_migrations, run_migrations as run_db_migrations,
    validate_migrations, MigrationInfo,
};
pub use pool::{create_pool, get_pool_stats, DbPool, PoolStats};
pub use repository::{load_snapshot, ResourceStore};
pub use sqlite::SqliteStore;

use crate::errors::{AglbError, Result};

/// Run database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    migrations::run_migrations(pool).await
}

/// Check database connectivity
pub async fn check_connection(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| AglbError::database(e, "Database connectivity check failed"))?;

    Ok(())
}
