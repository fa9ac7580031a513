//! Sound bank: immutable, profile-indexed sample sets
//!
//! A [`SoundBank`] is built once (from the synthesized defaults, optionally
//! overlaid with WAV files) and then shared read-only between the control
//! loop and the audio task behind an `Arc`. Nothing in it is mutated after
//! construction.

mod profile;
mod synth;
mod wav;

pub use profile::*;
pub use wav::{load_wav_sample, PACK_FILES};

use std::ops::Range;
use std::sync::Arc;

use crate::effects::EffectChannel;
use crate::engine::{EngineError, EngineResult};
use crate::types::{BankSample, ENGINE_SAMPLE_RATE};

/// One immutable PCM stream (8-bit signed, mono)
#[derive(Debug, Clone)]
pub struct SoundSample {
    data: Arc<[BankSample]>,
    sample_rate: u32,
    loop_region: Option<Range<usize>>,
}

impl SoundSample {
    pub fn new(data: Vec<BankSample>, sample_rate: u32) -> Self {
        Self {
            data: data.into(),
            sample_rate,
            loop_region: None,
        }
    }

    /// Attach a sustain region; playback wraps to `region.start` at `region.end`
    ///
    /// The region is clamped to the sample length; an empty region is ignored.
    pub fn with_loop_region(mut self, region: Range<usize>) -> Self {
        let end = region.end.min(self.data.len());
        let start = region.start.min(end);
        self.loop_region = (start < end).then_some(start..end);
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample at `index`, silence past the end
    #[inline]
    pub fn at(&self, index: usize) -> BankSample {
        self.data.get(index).copied().unwrap_or(0)
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn loop_region(&self) -> Option<&Range<usize>> {
        self.loop_region.as_ref()
    }

    pub fn data(&self) -> &[BankSample] {
        &self.data
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.data.len() as u64 * 1000 / self.sample_rate as u64
    }
}

/// Generic effect samples shared by every profile
#[derive(Debug, Clone)]
pub struct EffectBank {
    pub air_brake: SoundSample,
    pub reverse_beep: SoundSample,
    pub gear_shift: SoundSample,
    pub wastegate: SoundSample,
    pub mode_switch: SoundSample,
    pub horns: [SoundSample; HornType::COUNT],
}

/// All profiles plus the generic effects
#[derive(Debug, Clone)]
pub struct SoundBank {
    profiles: Vec<SoundProfile>,
    effects: EffectBank,
}

impl SoundBank {
    /// The synthesized built-in bank
    pub fn builtin() -> Self {
        let profiles = ProfileId::ALL.iter().map(|&id| synth::profile(id)).collect();
        Self {
            profiles,
            effects: synth::effects(),
        }
    }

    /// Assemble a bank from explicit parts
    ///
    /// Profiles must be given in [`ProfileId`] order, one per identifier.
    pub fn from_parts(profiles: Vec<SoundProfile>, effects: EffectBank) -> EngineResult<Self> {
        if profiles.len() != ProfileId::COUNT {
            return Err(EngineError::InvalidArgument(format!(
                "sound bank needs {} profiles, got {}",
                ProfileId::COUNT,
                profiles.len()
            )));
        }
        for (index, profile) in profiles.iter().enumerate() {
            if profile.id as usize != index {
                return Err(EngineError::InvalidArgument(format!(
                    "profile {} is at slot {}",
                    profile.id.name(),
                    index
                )));
            }
        }
        Ok(Self { profiles, effects })
    }

    /// Profile by identifier; every `ProfileId` has exactly one slot
    #[inline]
    pub fn profile(&self, id: ProfileId) -> &SoundProfile {
        &self.profiles[id as usize]
    }

    /// Profile by raw index, as received from outside the crate
    pub fn profile_by_index(&self, index: u8) -> EngineResult<&SoundProfile> {
        ProfileId::from_index(index)
            .map(|id| self.profile(id))
            .ok_or(EngineError::InvalidProfile(index))
    }

    pub fn profiles(&self) -> &[SoundProfile] {
        &self.profiles
    }

    pub fn effects(&self) -> &EffectBank {
        &self.effects
    }

    /// Sample for an effect channel, preferring the profile's own
    /// shift/wastegate recordings over the generic ones
    pub fn effect_sample(&self, profile: ProfileId, channel: EffectChannel, horn: HornType) -> &SoundSample {
        let p = self.profile(profile);
        match channel {
            EffectChannel::AirBrake => &self.effects.air_brake,
            EffectChannel::ReverseBeep => &self.effects.reverse_beep,
            EffectChannel::GearShift => p.shift.as_ref().unwrap_or(&self.effects.gear_shift),
            EffectChannel::Wastegate => p.wastegate.as_ref().unwrap_or(&self.effects.wastegate),
            EffectChannel::ModeSwitch => &self.effects.mode_switch,
            EffectChannel::Horn => &self.effects.horns[horn as usize],
        }
    }
}

impl Default for SoundBank {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Sample rate every built-in stream is generated at
pub const BANK_SAMPLE_RATE: u32 = ENGINE_SAMPLE_RATE;
