/// Domain error type shared by model operations
///
/// Model-level operations that enforce business rules (membership checks,
/// invariant guards, validation) return `DomainError` instead of a raw
/// `sqlx::Error`, so the API layer can map each variant to the right HTTP
/// status without string matching.

use thiserror::Error;

/// Result alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Errors produced by domain operations
#[derive(Debug, Error)]
pub enum DomainError {
    /// Missing or malformed input (maps to 400)
    #[error("{0}")]
    Validation(String),

    /// Authenticated but not permitted (maps to 403)
    #[error("{0}")]
    Forbidden(String),

    /// Resource absent (maps to 404)
    #[error("{0}")]
    NotFound(String),

    /// State-invariant violation (maps to 409)
    #[error("{0}")]
    Conflict(String),

    /// Unexpected persistence failure (maps to 500)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl DomainError {
    /// Shorthand for a validation failure
    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    /// Shorthand for a forbidden failure
    pub fn forbidden(msg: impl Into<String>) -> Self {
        DomainError::Forbidden(msg.into())
    }

    /// Shorthand for a not-found failure
    pub fn not_found(msg: impl Into<String>) -> Self {
        DomainError::NotFound(msg.into())
    }

    /// Shorthand for a conflict failure
    pub fn conflict(msg: impl Into<String>) -> Self {
        DomainError::Conflict(msg.into())
    }
}
