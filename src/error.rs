//! Error types for the BodyMetrics service.

use thiserror::Error;

use crate::mail::MailError;
use crate::store::StoreError;

/// Main error type for BodyMetrics operations.
#[derive(Error, Debug)]
pub enum BodyMetricsError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Outbound email errors
    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    /// Token signing or verification errors
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Password hashing errors
    #[error("Password hash error: {0}")]
    PasswordHash(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for BodyMetricsError {
    fn from(e: config::ConfigError) -> Self {
        BodyMetricsError::Config(e.to_string())
    }
}

/// Result type alias for BodyMetrics operations.
pub type Result<T> = std::result::Result<T, BodyMetricsError>;
