//! Common error types for MV Studio

use thiserror::Error;

/// Common result type for MV Studio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the UI service and its helpers
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Lyrics contained no usable sections
    ///
    /// Signalled separately from network failures so the UI can show a
    /// format-specific message.
    #[error("No valid sections found in lyrics")]
    NoSections,

    /// A job with the same id is already in progress
    #[error("Job already in progress: {0}")]
    Conflict(String),

    /// Status fetch failed while polling a job
    #[error("Status fetch failed: {0}")]
    Fetch(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
