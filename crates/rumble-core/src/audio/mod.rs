//! Audio output
//!
//! - [`spawn_audio_task`]: the thread that renders the engine and writes it out
//! - [`SharedOutput`]: single-writer token shared with system chimes
//! - `cpal_backend` (feature `cpal-backend`): live output through CPAL

#[cfg(feature = "cpal-backend")]
mod cpal_backend;
mod device;
mod error;
mod task;

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::{open_default_output, CpalOutput, CpalStream};
pub use device::{CaptureOutput, NullOutput, OutputDevice, OutputGuard, Producer, SharedOutput};
pub use error::{AudioError, AudioResult};
pub use task::{spawn_audio_task, AudioStats, AudioTaskConfig, AudioTaskHandle};
