//! Engine API error types

use thiserror::Error;

/// Errors returned by the engine control API
///
/// Every variant means the call was rejected and nothing changed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Profile identifier outside the sound bank
    #[error("Unknown sound profile: {0}")]
    InvalidProfile(u8),

    /// Effect channel identifier out of range
    #[error("Unknown effect channel: {0}")]
    InvalidChannel(u8),

    /// Volume preset index out of range
    #[error("Volume preset {0} does not exist")]
    InvalidPreset(usize),

    /// Setter argument out of its documented range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Engine sound switched off
    #[error("Engine sound is disabled")]
    Disabled,

    /// stop() arrived while the start sample was playing
    #[error("Engine start was aborted")]
    StartAborted,

    /// The audio task never finished the start sequence
    #[error("Engine start timed out after {0} ms")]
    StartTimeout(u64),

    /// Audio task is not draining its command queue
    #[error("Engine command queue is full")]
    CommandQueueFull,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
