//! # Structured Logging
//!
//! Subscriber setup and span macros built on the tracing ecosystem. Output
//! is human readable by default and one JSON object per line when
//! `AGLB_JSON_LOGGING` is enabled. `RUST_LOG` overrides the configured
//! level.

use tracing_subscriber::EnvFilter;

use crate::config::ObservabilityConfig;
use crate::errors::{AglbError, Result};

/// Create a tracing span for request tracking.
///
/// ```rust,ignore
/// let span = request_span!("POST", "/v4beta/aglb", label = "edge");
/// ```
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4()
        )
    };
    ($method:expr, $path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span for database operations
#[macro_export]
macro_rules! db_span {
    ($operation:expr) => {
        tracing::debug_span!(
            "db_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "db_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Build the filter: `RUST_LOG` when set, the configured level otherwise
pub fn build_filter(config: &ObservabilityConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            AglbError::config_with_source(
                format!("Invalid log level '{}'", config.log_level),
                Box::new(e),
            )
        }),
    }
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed (tests, or
/// an embedding binary), which is not an error.
pub fn init_logging(config: &ObservabilityConfig) -> Result<bool> {
    let filter = build_filter(config)?;

    let installed = if config.json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_target(true)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init().is_ok()
    };

    if installed {
        tracing::debug!(
            service_name = %config.service_name,
            log_level = %config.log_level,
            json = config.json_logging,
            "Logging initialized"
        );
    }
    Ok(installed)
}

/// Log configuration at startup
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        service_name = %config.observability.service_name,
        server_address = %config.server.bind_address(),
        database_in_memory = config.database.is_in_memory(),
        auto_migrate = config.database.auto_migrate,
        base_domain = %config.aglb.base_domain,
        cors_enabled = config.server.enable_cors,
        "AGLB service configuration"
    );
}
