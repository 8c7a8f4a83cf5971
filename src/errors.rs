// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::cloud::ClientError;
use crate::lifecycle::LifecycleError;

#[derive(Error, Debug)]
pub enum StackrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A run precondition was violated; nothing was started or reported.
    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StackrunError>;
