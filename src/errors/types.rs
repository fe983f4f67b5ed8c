//! # Error Types
//!
//! Error types for the AGLB configuration service using `thiserror`.

use crate::validation::{ErrorKind, ValidationReport};

/// Custom result type for AGLB operations
pub type Result<T> = std::result::Result<T, AglbError>;

/// Main error type for the AGLB configuration service
#[derive(thiserror::Error, Debug)]
pub enum AglbError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization { context: String },

    /// Payload validation failed; every issue found is carried in the report
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    /// A referenced entity does not exist (validation snapshot or commit time)
    #[error("Resource not found: {resource_type} with ID '{id}'")]
    NotFound { resource_type: String, id: String },

    /// Commit-time race: the stored graph changed since the snapshot was taken
    #[error("Resource conflict: {message}")]
    Conflict { message: String, resource_type: String },

    /// Illegal proposal state transition
    #[error("Invalid proposal transition: {message}")]
    InvalidState { message: String },

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl AglbError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(context: S) -> Self {
        Self::Serialization { context: context.into() }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create a conflict error
    pub fn conflict<M: Into<String>, R: Into<String>>(message: M, resource_type: R) -> Self {
        Self::Conflict { message: message.into(), resource_type: resource_type.into() }
    }

    /// Create an invalid state transition error
    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        Self::InvalidState { message: message.into() }
    }

    /// Create an internal server error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Wrap a sqlx error with context
    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Database { source, context: context.into() }
    }

    /// Validation taxonomy kind of this error, when it has one.
    ///
    /// Commit-time failures map onto the same taxonomy as validation issues so
    /// callers can tell `ReferenceNotFound` and `Conflict` apart from the rest.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AglbError::NotFound { .. } => Some(ErrorKind::ReferenceNotFound),
            AglbError::Conflict { .. } => Some(ErrorKind::Conflict),
            _ => None,
        }
    }

    /// Get the HTTP status code that should be returned for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AglbError::Config { .. } => 500,
            AglbError::Database { .. } => 500,
            AglbError::Io { .. } => 500,
            AglbError::Serialization { .. } => 400,
            AglbError::Validation(_) => 400,
            AglbError::NotFound { .. } => 404,
            AglbError::Conflict { .. } => 409,
            AglbError::InvalidState { .. } => 409,
            AglbError::Internal { .. } => 500,
        }
    }

    /// Check if this error should be retried by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(self, AglbError::Conflict { .. } | AglbError::Database { .. } | AglbError::Io { .. })
    }
}

impl From<sqlx::Error> for AglbError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<std::io::Error> for AglbError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for AglbError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization(format!("JSON serialization failed: {}", error))
    }
}

impl From<serde_yaml::Error> for AglbError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::serialization(format!("YAML parsing failed: {}", error))
    }
}

impl From<ValidationReport> for AglbError {
    fn from(report: ValidationReport) -> Self {
        Self::Validation(report)
    }
}

impl From<validator::ValidationErrors> for AglbError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::config(format!("Configuration validation failed: {}", message))
    }
}
