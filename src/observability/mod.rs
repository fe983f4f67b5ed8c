//! # Observability Infrastructure
//!
//! Structured logging for the AGLB service.

pub mod logging;

pub use logging::{build_filter, init_logging, log_config_info};
