//! CPAL output backend
//!
//! ```text
//! ┌──────────────────┐  write()   ┌─────────────────────┐  pop()   ┌──────────────────┐
//! │   Audio task     │──────────► │   Frame queue       │────────► │ CPAL callback    │
//! │ (22.05 kHz, i16) │            │  (lock-free SPSC)   │          │ (device rate,f32)│
//! └──────────────────┘            └─────────────────────┘          └──────────────────┘
//! ```
//!
//! The audio task stays the clock master: it renders at the engine rate and
//! the callback resamples to whatever the device runs at. An empty queue
//! plays silence; a full queue makes write() time out.

use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use super::device::OutputDevice;
use super::error::{AudioError, AudioResult};
use crate::types::{StereoFrame, ENGINE_SAMPLE_RATE};

/// Poll interval while waiting for queue space
const WRITE_POLL: Duration = Duration::from_millis(1);

/// Keeps the CPAL stream alive; drop to stop output
pub struct CpalStream {
    _stream: Stream,
    sample_rate: u32,
}

impl CpalStream {
    /// Device sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Producer end of the frame queue feeding the CPAL callback
pub struct CpalOutput {
    producer: rtrb::Producer<StereoFrame>,
}

impl OutputDevice for CpalOutput {
    fn write(&mut self, frames: &[StereoFrame], timeout: Duration) -> AudioResult<()> {
        let deadline = Instant::now() + timeout;
        while self.producer.slots() < frames.len() {
            if Instant::now() >= deadline {
                return Err(AudioError::WriteTimeout {
                    frames: frames.len(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            thread::sleep(WRITE_POLL);
        }
        for &frame in frames {
            // Space was checked above and this is the only producer
            let _ = self.producer.push(frame);
        }
        Ok(())
    }
}

/// Open the default output device
///
/// `queue_frames` bounds the latency between the audio task and the device.
pub fn open_default_output(queue_frames: usize) -> AudioResult<(CpalOutput, CpalStream)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::NoDefaultDevice("No default output device".to_string()))?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;
    if supported.sample_format() != SampleFormat::F32 {
        return Err(AudioError::UnsupportedFormat(format!("{:?}", supported.sample_format())));
    }
    let config: StreamConfig = supported.config();
    let sample_rate = config.sample_rate.0;

    log::info!(
        "Using audio device: {} ({} channels, {}Hz)",
        device_name,
        config.channels,
        sample_rate
    );

    let (producer, consumer) = rtrb::RingBuffer::new(queue_frames.max(1));
    let stream = build_output_stream(&device, &config, consumer)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    Ok((
        CpalOutput { producer },
        CpalStream {
            _stream: stream,
            sample_rate,
        },
    ))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut consumer: rtrb::Consumer<StereoFrame>,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;
    // Engine frames consumed per device frame
    let step = ENGINE_SAMPLE_RATE as f64 / config.sample_rate.0 as f64;
    let mut phase = 1.0f64;
    let mut current = StereoFrame::silence();

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    while phase >= 1.0 {
                        current = consumer.pop().unwrap_or_default();
                        phase -= 1.0;
                    }
                    phase += step;

                    frame[0] = current.left as f32 / 32768.0;
                    if channels > 1 {
                        frame[1] = current.right as f32 / 32768.0;
                    }
                    for ch in frame.iter_mut().skip(2) {
                        *ch = 0.0;
                    }
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}
