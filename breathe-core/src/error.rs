//! Error types for breathe-core
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for breathe-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pattern rejected before a session could start
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Unknown pattern identifier
    #[error("Pattern not found: {0}")]
    PatternNotFound(String),

    /// Media source could not be loaded
    #[error("Load error: {0}")]
    Load(String),

    /// Playback was rejected by the platform
    #[error("Playback error: {0}")]
    Playback(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Narration persona could not be activated
    #[error("Narration error: {0}")]
    Narration(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Errors from the common crate
    #[error(transparent)]
    Common(#[from] breathe_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),
}

/// Convenience Result type using breathe-core Error
pub type Result<T> = std::result::Result<T, Error>;
