//! Effect channels and the detector that triggers them

mod triggers;

pub use triggers::*;

use serde::{Deserialize, Serialize};

/// How a channel behaves once its sample reaches the end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    /// Plays once and clears itself
    OneShot,
    /// Wraps to 0 while its level holds
    Loop,
    /// Wraps inside the sample's loop region while held, then plays the tail
    Sustain,
}

/// The six independent effect channels mixed over the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EffectChannel {
    AirBrake = 0,
    ReverseBeep = 1,
    GearShift = 2,
    Wastegate = 3,
    ModeSwitch = 4,
    Horn = 5,
}

impl EffectChannel {
    pub const COUNT: usize = 6;
    pub const ALL: [EffectChannel; Self::COUNT] = [
        Self::AirBrake,
        Self::ReverseBeep,
        Self::GearShift,
        Self::Wastegate,
        Self::ModeSwitch,
        Self::Horn,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AirBrake => "air brake",
            Self::ReverseBeep => "reverse beep",
            Self::GearShift => "gear shift",
            Self::Wastegate => "wastegate",
            Self::ModeSwitch => "mode switch",
            Self::Horn => "horn",
        }
    }

    pub fn playback(&self) -> Playback {
        match self {
            Self::ReverseBeep => Playback::Loop,
            Self::Horn => Playback::Sustain,
            _ => Playback::OneShot,
        }
    }
}
