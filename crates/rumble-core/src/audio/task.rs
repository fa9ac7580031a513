//! The audio task
//!
//! A dedicated thread that owns the [`EngineVoice`]: it renders one buffer
//! at a time and writes it to the shared output while it holds the
//! single-writer token. It never blocks on the token and never blocks the
//! control loop; a device that stops accepting data costs dropped buffers,
//! nothing more.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::device::{OutputDevice, Producer, SharedOutput};
use super::error::{AudioError, AudioResult};
use crate::engine::{EngineVoice, RenderOutcome};
use crate::types::{buffer_period_ms, StereoBuffer, BUFFER_FRAMES};

/// Underruns are logged on the first and then every this many
const UNDERRUN_LOG_EVERY: u64 = 100;

#[derive(Debug, Clone)]
pub struct AudioTaskConfig {
    /// Frames rendered per buffer
    pub buffer_frames: usize,
    /// How long a device write may take before the buffer is dropped
    pub write_timeout: Duration,
    /// Sleep while the engine is off
    pub idle_poll: Duration,
    /// Sleep while another producer holds the device
    pub busy_poll: Duration,
}

impl Default for AudioTaskConfig {
    fn default() -> Self {
        Self {
            buffer_frames: BUFFER_FRAMES,
            write_timeout: Duration::from_millis(buffer_period_ms(BUFFER_FRAMES).max(1)),
            idle_poll: Duration::from_millis(50),
            busy_poll: Duration::from_millis(10),
        }
    }
}

/// Counters published by the audio task
#[derive(Debug, Default)]
pub struct AudioStats {
    buffers_written: AtomicU64,
    underruns: AtomicU64,
    write_errors: AtomicU64,
    failed: AtomicBool,
}

impl AudioStats {
    pub fn buffers_written(&self) -> u64 {
        self.buffers_written.load(Ordering::Relaxed)
    }

    /// Buffers dropped because the device write timed out
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Buffers dropped for any other device error
    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    /// The task hit a fatal error and exited
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Running audio task; stops and joins on drop
pub struct AudioTaskHandle {
    running: Arc<AtomicBool>,
    stats: Arc<AudioStats>,
    thread_handle: Option<JoinHandle<EngineVoice>>,
}

impl AudioTaskHandle {
    pub fn stats(&self) -> &Arc<AudioStats> {
        &self.stats
    }

    /// Stop the task and take the voice back
    pub fn stop(mut self) -> Option<EngineVoice> {
        self.join()
    }

    fn join(&mut self) -> Option<EngineVoice> {
        self.running.store(false, Ordering::Relaxed);
        let handle = self.thread_handle.take()?;
        match handle.join() {
            Ok(voice) => Some(voice),
            Err(_) => {
                log::error!("Audio task panicked");
                None
            }
        }
    }
}

impl Drop for AudioTaskHandle {
    fn drop(&mut self) {
        self.join();
    }
}

/// Start the audio task on its own thread
pub fn spawn_audio_task<D>(
    voice: EngineVoice,
    output: Arc<SharedOutput<D>>,
    config: AudioTaskConfig,
) -> AudioResult<AudioTaskHandle>
where
    D: OutputDevice + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let stats = Arc::new(AudioStats::default());

    let task = AudioTask {
        voice,
        output,
        config,
        running: Arc::clone(&running),
        stats: Arc::clone(&stats),
    };
    let handle = thread::Builder::new()
        .name("engine-audio".into())
        .spawn(move || task.run())
        .map_err(|e| AudioError::ThreadSpawn(e.to_string()))?;

    Ok(AudioTaskHandle {
        running,
        stats,
        thread_handle: Some(handle),
    })
}

struct AudioTask<D> {
    voice: EngineVoice,
    output: Arc<SharedOutput<D>>,
    config: AudioTaskConfig,
    running: Arc<AtomicBool>,
    stats: Arc<AudioStats>,
}

impl<D: OutputDevice> AudioTask<D> {
    fn run(mut self) -> EngineVoice {
        let mut buffer = match StereoBuffer::try_silence(self.config.buffer_frames) {
            Ok(buffer) => buffer,
            Err(e) => {
                let err = AudioError::BufferAllocation(e.to_string());
                log::error!("Audio task cannot start: {}", err);
                self.stats.failed.store(true, Ordering::Relaxed);
                return self.voice;
            }
        };
        log::info!(
            "Audio task started ({} frames, write timeout {:?})",
            self.config.buffer_frames,
            self.config.write_timeout
        );

        while self.running.load(Ordering::Relaxed) {
            if self.voice.is_idle() {
                thread::sleep(self.config.idle_poll);
                continue;
            }

            let Some(mut device) = self.output.try_claim(Producer::Engine) else {
                thread::sleep(self.config.busy_poll);
                continue;
            };

            if self.voice.render(buffer.as_mut_slice()) == RenderOutcome::Silent {
                continue;
            }

            match device.write(buffer.as_slice(), self.config.write_timeout) {
                Ok(()) => {
                    self.stats.buffers_written.fetch_add(1, Ordering::Relaxed);
                }
                Err(AudioError::WriteTimeout { frames, timeout_ms }) => {
                    let n = self.stats.underruns.fetch_add(1, Ordering::Relaxed) + 1;
                    if n == 1 || n % UNDERRUN_LOG_EVERY == 0 {
                        log::warn!("Audio underrun #{}: {} frames dropped after {} ms", n, frames, timeout_ms);
                    }
                }
                Err(e) => {
                    let n = self.stats.write_errors.fetch_add(1, Ordering::Relaxed) + 1;
                    if n == 1 || n % UNDERRUN_LOG_EVERY == 0 {
                        log::warn!("Audio write error #{}: {}", n, e);
                    }
                }
            }
        }

        log::info!("Audio task stopped");
        self.voice
    }
}
