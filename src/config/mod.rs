//! # Configuration Management
//!
//! Application configuration is read from the environment (optionally
//! seeded from a `.env` file) and validated before the service starts.

pub mod settings;

pub use settings::{AglbConfig, AppConfig, DatabaseConfig, ObservabilityConfig, ServerConfig};

use crate::errors::Result;

/// Load `.env` if present, then build and validate the configuration
pub fn load() -> Result<AppConfig> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded environment from .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to read .env file"),
    }
    AppConfig::from_env()
}
