//! Error types for container managers

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to connect to container runtime: {0}")]
    ConnectionError(String),

    #[error("Container manager used before init")]
    NotInitialized,

    #[error("Container manager '{0}' is not supported")]
    UnknownBackend(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Container name already in use: {0}")]
    NameConflict(String),

    #[error("Container runtime error: {0}")]
    RuntimeError(String),

    #[error("Log stream failed: {0}")]
    LogStream(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;
