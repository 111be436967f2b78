//! Error types for the address book and scheduler.

use thiserror::Error;

/// Network management errors
#[derive(Debug, Error)]
pub enum NetError {
    /// File or socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Whitelist download failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Address text does not parse
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Whitelist source misconfigured or unusable
    #[error("whitelist error: {0}")]
    Whitelist(String),
}

/// Result type for network management operations
pub type Result<T> = std::result::Result<T, NetError>;
