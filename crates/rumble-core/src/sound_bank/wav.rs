//! Custom sound packs loaded from WAV files
//!
//! A pack directory holds one sub-directory per profile slug. Any of the
//! files in [`PACK_FILES`] found there replaces the built-in stream; missing
//! files keep the synthesized default.

use std::path::Path;

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader};

use super::{SoundBank, SoundProfile, SoundSample, BANK_SAMPLE_RATE};
use crate::types::BankSample;

/// File names recognised inside a profile directory
pub const PACK_FILES: [&str; 7] = [
    "idle.wav",
    "rev.wav",
    "knock.wav",
    "start.wav",
    "jake.wav",
    "shift.wav",
    "wastegate.wav",
];

/// Read a WAV file as 8-bit signed mono at the bank sample rate
///
/// Multi-channel files are down-mixed; other sample rates are resampled with
/// nearest-neighbour picking, which is adequate for engine loops.
pub fn load_wav_sample(path: &Path) -> Result<SoundSample> {
    let mut reader = WavReader::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .with_context(|| format!("Failed to decode {:?}", path))?
        }
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .with_context(|| format!("Failed to decode {:?}", path))?,
    };

    if interleaved.is_empty() {
        bail!("{:?} contains no samples", path);
    }

    let mono: Vec<f32> = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    let data = resample_nearest(&mono, spec.sample_rate, BANK_SAMPLE_RATE)
        .into_iter()
        .map(|v| (v.clamp(-1.0, 1.0) * 127.0).round() as BankSample)
        .collect();

    if spec.sample_rate != BANK_SAMPLE_RATE {
        log::info!(
            "load_wav_sample: resampled {:?} from {}Hz to {}Hz",
            path,
            spec.sample_rate,
            BANK_SAMPLE_RATE
        );
    }

    Ok(SoundSample::new(data, BANK_SAMPLE_RATE))
}

fn resample_nearest(input: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || from == 0 || input.is_empty() {
        return input.to_vec();
    }
    let out_len = (input.len() as u64 * to as u64 / from as u64).max(1) as usize;
    (0..out_len)
        .map(|i| {
            let src = (i as u64 * from as u64 / to as u64) as usize;
            input[src.min(input.len() - 1)]
        })
        .collect()
}

impl SoundBank {
    /// Overlay a custom pack on top of this bank
    ///
    /// Unreadable files are skipped with a warning so one broken recording
    /// never takes the whole bank down.
    pub fn with_pack(mut self, dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            bail!("Sound pack {:?} is not a directory", dir);
        }

        let mut replaced = 0usize;
        for profile in self.profiles.iter_mut() {
            let profile_dir = dir.join(profile.id.slug());
            if !profile_dir.is_dir() {
                continue;
            }
            for file in PACK_FILES {
                let path = profile_dir.join(file);
                if !path.exists() {
                    continue;
                }
                match load_wav_sample(&path) {
                    Ok(sample) => {
                        apply_pack_file(profile, file, sample);
                        replaced += 1;
                    }
                    Err(e) => log::warn!("with_pack: skipping {:?}: {:#}", path, e),
                }
            }
        }

        log::info!("with_pack: {} samples replaced from {:?}", replaced, dir);
        Ok(self)
    }
}

fn apply_pack_file(profile: &mut SoundProfile, file: &str, sample: SoundSample) {
    match file {
        "idle.wav" => profile.idle = sample,
        "rev.wav" => profile.rev = sample,
        "knock.wav" => profile.knock = sample,
        "start.wav" => profile.start = Some(sample),
        "jake.wav" => profile.jake_brake = Some(sample),
        "shift.wav" => profile.shift = Some(sample),
        "wastegate.wav" => profile.wastegate = Some(sample),
        _ => {}
    }
}
