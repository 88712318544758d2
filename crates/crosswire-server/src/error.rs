//! Error types for the crosswire server.

use thiserror::Error;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// I/O error (socket operations, config file reads).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every configured account is rate-limited or unauthorized.
    #[error("No upstream account available")]
    NoAccount,
}

/// Result type alias using `ServerError`.
pub type Result<T> = std::result::Result<T, ServerError>;
