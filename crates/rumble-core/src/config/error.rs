//! Configuration error types

use std::io;
use thiserror::Error;

/// Errors from a persistent key/value backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// Nothing stored under this key yet
    #[error("No record stored under '{0}'")]
    NotFound(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from loading, validating or saving an engine configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A field is outside its allowed range
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Record bytes could not be decoded
    #[error("Corrupt config record: {0}")]
    Corrupt(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The persistence thread is gone
    #[error("Config writer stopped")]
    WriterStopped,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
