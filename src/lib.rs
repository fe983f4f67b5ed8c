//! # AGLB
//!
//! Configuration model and validator for an application gateway load
//! balancer. A request describing a loadbalancer (or a standalone
//! configuration, route or certificate) is validated as a whole, every
//! problem is reported at once, and only a fully valid graph of entities
//! is committed, atomically.
//!
//! ## Architecture
//!
//! ```text
//! HTTP API / CLI → Services → Proposal lifecycle → ResourceStore
//!                                  ↓
//!                        validation (pure functions)
//! ```
//!
//! - **validation**: primitive validators, match condition resolution,
//!   service target assembly, route composition and configuration
//!   aggregation, driven by [`validation::Proposal`]
//! - **domain**: the normalized, committed entity model
//! - **storage**: the [`storage::ResourceStore`] seam with SQLite and
//!   in-memory implementations
//! - **api**: axum router over the services

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod services;
pub mod storage;
pub mod validation;

pub use errors::{AglbError, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "aglb");
    }
}
