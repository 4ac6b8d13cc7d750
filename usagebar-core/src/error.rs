//! Error types for usagebar-core

use thiserror::Error;

/// Main error type for the usagebar-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Preference store error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Preference store unusable (poisoned lock, bad value)
    #[error("store error: {0}")]
    Store(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level HTTP failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote API answered with a non-success status
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Remote API rejected the credential (401/403)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Stored value could not be encoded or decoded
    #[error("encoding error for '{key}': {message}")]
    Encoding { key: String, message: String },

    /// Icon image encoding error
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Desktop notification could not be shown
    #[error("notification error: {0}")]
    Notification(String),

    /// User input rejected during setup
    #[error("validation error: {0}")]
    Validation(String),

    /// Manager loop is no longer running
    #[error("status manager has shut down")]
    ManagerStopped,
}

impl Error {
    /// Whether the error means the stored credential is no longer accepted
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }
}

/// Result type alias for usagebar-core
pub type Result<T> = std::result::Result<T, Error>;
