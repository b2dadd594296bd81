//! Error types for the throttle.

use std::time::Duration;
use thiserror::Error;

/// Main error type for throttle operations.
#[derive(Error, Debug)]
pub enum ThrottleError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A limit of zero would never admit a call
    #[error("Invalid limit for '{key}': limits must be at least 1 per second")]
    InvalidLimit { key: String },

    /// A deadline-bounded acquire gave up before capacity became available
    #[error("Deadline exceeded waiting for '{key}' after {waited:?}")]
    DeadlineExceeded { key: String, waited: Duration },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for throttle operations.
pub type Result<T> = std::result::Result<T, ThrottleError>;
