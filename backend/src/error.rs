//! Error handling for the Feedlot Management Platform
//!
//! One taxonomy for the whole engine: validation failures surface to the
//! caller as 4xx-equivalent errors, storage failures as 5xx-equivalent, and
//! any failure during a mutation leaves state untouched.

use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Business logic errors
    #[error("No active occupants in pen {pen_id}")]
    NoOccupants { pen_id: Uuid },

    #[error("Pen {pen_id} has occupancy links but zero head")]
    ZeroOccupancy { pen_id: Uuid },

    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Optimistic-concurrency clash or an operation rejected by lifecycle
    /// state (e.g., regenerating a closed analysis). Retryable when raised
    /// from a snapshot-verification failure.
    #[error("Conflict: {0}")]
    Conflict(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for field validation failures
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// HTTP-equivalent status class for the (external) transport layer
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NoOccupants { .. } | AppError::ZeroOccupancy { .. } => 422,
            AppError::Validation { .. } => 400,
            AppError::NotFound(_) => 404,
            AppError::Conflict(_) => 409,
            AppError::Database(_) | AppError::Configuration(_) | AppError::Internal(_) => 500,
        }
    }

    /// Whether retrying the operation against a fresh snapshot makes sense
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }
}

/// Result type alias for services
pub type AppResult<T> = Result<T, AppError>;
