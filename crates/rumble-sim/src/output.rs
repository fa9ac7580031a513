//! Where the rendered engine goes

use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

use rumble_core::audio::{AudioError, AudioResult, OutputDevice};
use rumble_core::{StereoFrame, ENGINE_SAMPLE_RATE};

/// 16-bit stereo WAV at the engine rate
pub struct WavOutput {
    writer: hound::WavWriter<BufWriter<File>>,
    frames: u64,
}

impl WavOutput {
    pub fn create(path: &Path) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: ENGINE_SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec).with_context(|| format!("Failed to create {:?}", path))?;
        Ok(Self { writer, frames: 0 })
    }

    /// Frames written so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Patch the header and close the file
    pub fn finish(self) -> Result<()> {
        self.writer.finalize().context("Failed to finalize WAV file")
    }
}

impl OutputDevice for WavOutput {
    fn write(&mut self, frames: &[StereoFrame], _timeout: Duration) -> AudioResult<()> {
        for frame in frames {
            self.writer
                .write_sample(frame.left)
                .and_then(|()| self.writer.write_sample(frame.right))
                .map_err(|e| AudioError::Device(e.to_string()))?;
        }
        self.frames += frames.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_output_writes_stereo_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let mut wav = WavOutput::create(&path).unwrap();
        wav.write(&[StereoFrame::new(100, -100); 64], Duration::ZERO).unwrap();
        assert_eq!(wav.frames(), 64);
        wav.finish().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, ENGINE_SAMPLE_RATE);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 128);
        assert_eq!(&samples[..2], &[100, -100]);
    }
}
