//! Common error types for backline
//!
//! One taxonomy shared by every service crate. Handlers translate these to
//! HTTP status codes at the boundary; nothing below the boundary retries.

use thiserror::Error;

/// Common result type for backline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across backline services
#[derive(Error, Debug)]
pub enum Error {
    /// Downstream database failure (wraps sqlx::Error, message forwarded)
    #[error("Database error: {0}")]
    Backend(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter (user-correctable)
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Missing or invalid caller identity
    #[error("Unauthorized: {0}")]
    Auth(String),

    /// Caller exceeded a request rate limit
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Internal server error (generic message, internals stay in the logs)
    #[error("Internal error: {0}")]
    Internal(String),
}
