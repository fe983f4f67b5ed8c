//! # Error Handling
//!
//! Infrastructure errors for the AGLB service. Payload validation problems are
//! collected into a [`crate::validation::ValidationReport`] and surface here as
//! [`AglbError::Validation`].

pub mod types;

pub use types::{AglbError, Result};
