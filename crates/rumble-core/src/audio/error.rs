//! Audio error types

use thiserror::Error;

/// Errors that can occur on the audio side
///
/// None of these ever reach the control path: the audio task logs them and
/// degrades to silence.
#[derive(Error, Debug)]
pub enum AudioError {
    /// Output buffer could not be allocated; the audio task cannot run
    #[error("Failed to allocate audio buffer: {0}")]
    BufferAllocation(String),

    /// The device did not accept a buffer in time; the buffer was dropped
    #[error("Output write of {frames} frames timed out after {timeout_ms} ms")]
    WriteTimeout { frames: usize, timeout_ms: u64 },

    /// The output device failed for a reason other than a timeout
    #[error("Output device error: {0}")]
    Device(String),

    /// Audio thread could not be started
    #[error("Failed to spawn audio thread: {0}")]
    ThreadSpawn(String),

    /// No audio devices available
    #[error("No audio output devices found")]
    NoDevices,

    /// Failed to get default device
    #[error("Failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Unsupported sample format
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
