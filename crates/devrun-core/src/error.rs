//! Error types for devrun-core

use crate::network::NetworkModeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{0}")]
    Provider(#[from] devrun_provider::ProviderError),

    #[error("command line validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    NetworkMode(#[from] NetworkModeError),

    #[error("cannot create required directory '{}': {source}", path.display())]
    RequiredDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot create required file '{}': {source}", path.display())]
    RequiredFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Attach failed: {0}")]
    Attach(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
