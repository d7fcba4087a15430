//! Error types for Rookery
//!
//! All errors in the engine are converted to `AppError`. "No rows" from
//! storage is never an error at this layer: collaborator methods return
//! `Option`/empty collections for expected-empty outcomes, and `AppError`
//! is reserved for genuine faults.

use thiserror::Error;

/// Engine-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// A referenced entity is genuinely required and missing
    #[error("Resource not found")]
    NotFound,

    /// Validation error on an event or cursor
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage collaborator fault. "No rows" is not an error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A domain entity could not be converted to its client representation
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Federation delivery error
    #[error("Federation error: {0}")]
    Federation(String),

    /// Email delivery error
    #[error("Email error: {0}")]
    Email(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// One or more failures during fan-out to many recipients.
    ///
    /// Successful recipients were still processed; this is returned to the
    /// worker for logging, never used to roll back completed work.
    #[error("Fan-out partially failed: {}", .0.join("; "))]
    Fanout(Vec<String>),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Short label for the error metric.
    pub fn metric_label(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Validation(_) => "validation",
            AppError::Storage(_) => "storage",
            AppError::Conversion(_) => "conversion",
            AppError::HttpClient(_) => "http_client",
            AppError::Federation(_) => "federation",
            AppError::Email(_) => "email",
            AppError::Config(_) => "config",
            AppError::Fanout(_) => "fanout",
            AppError::Internal(_) => "internal",
        }
    }

    /// Fold a list of fan-out failures into a single error, or `Ok` when
    /// every branch succeeded.
    pub fn from_fanout(errors: Vec<String>) -> Result<()> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Fanout(errors))
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
