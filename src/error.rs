//! Error types for the Floodgate library.

use thiserror::Error;

/// Main error type for Floodgate operations.
#[derive(Error, Debug)]
pub enum FloodgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A permit could not be obtained within the configured timeout
    #[error("Request not permitted for limiter: {name}")]
    RequestNotPermitted {
        /// Name of the limiter that rejected the request
        name: String,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Floodgate operations.
pub type Result<T> = std::result::Result<T, FloodgateError>;
