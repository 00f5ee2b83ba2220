//! Common error types for the meeting recorder crates

use thiserror::Error;

/// Common result type for meeting recorder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the meeting recorder crates
///
/// Authorization and validation failures are raised before any store call
/// is made; persistence failures come back from the store itself.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No authenticated user for a mutating operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated user does not own the targeted record
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Missing or malformed field, rejected before any network call
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Store rejected the operation (network failure, constraint violation)
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short human-readable text suitable for showing to an end user
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::Unauthorized(_) => "Please sign in again.",
            Error::Forbidden(_) | Error::NotFound(_) => "That item could not be found.",
            Error::Validation(_) => "Some required information is missing.",
            Error::Database(_) | Error::Persistence(_) => "Your changes could not be saved.",
            Error::Io(_) | Error::Config(_) | Error::Internal(_) => "Something went wrong.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_internal_detail() {
        let err = Error::Persistence("UNIQUE constraint failed: notes.id".to_string());
        assert_eq!(err.user_message(), "Your changes could not be saved.");
        assert!(!err.user_message().contains("constraint"));
    }

    #[test]
    fn test_forbidden_reads_as_not_found() {
        let forbidden = Error::Forbidden("notes/abc".to_string());
        let missing = Error::NotFound("notes/abc".to_string());
        assert_eq!(forbidden.user_message(), missing.user_message());
    }
}
