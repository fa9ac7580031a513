//! Mixer-facing snapshot of the engine configuration

use crate::effects::EffectChannel;
use crate::sound_bank::HornType;
use crate::types::IDLE_RPM;

/// Everything the mixer reads from the configuration, copied by value
///
/// The control side builds one of these under the config lock and ships it
/// to the audio task over the command queue, so the audio task never touches
/// the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixSettings {
    /// Active master level, percent
    pub master_volume: u16,
    pub idle_volume: u16,
    pub rev_volume: u16,
    pub knock_volume: u16,
    pub start_volume: u16,
    /// Max RPM as percent of idle
    pub max_rpm_percentage: u16,
    /// Minimum RPM rise per smoothing step
    pub acceleration: u16,
    /// Minimum RPM fall per smoothing step
    pub deceleration: u16,
    pub rev_switch_point: u16,
    pub idle_end_point: u16,
    pub knock_start_point: u16,
    /// Knocks per idle loop
    pub knock_interval: u8,
    pub v8_mode: bool,
    pub jake_brake_enabled: bool,
    pub effect_enabled: [bool; EffectChannel::COUNT],
    pub effect_volume: [u16; EffectChannel::COUNT],
    pub horn: HornType,
}

impl MixSettings {
    /// RPM limiter derived from the max-RPM percentage
    #[inline]
    pub fn max_rpm(&self) -> u16 {
        (IDLE_RPM as u32 * self.max_rpm_percentage as u32 / 100).max(IDLE_RPM as u32) as u16
    }

    #[inline]
    pub fn effect_enabled(&self, channel: EffectChannel) -> bool {
        self.effect_enabled[channel.index()]
    }

    #[inline]
    pub fn effect_volume(&self, channel: EffectChannel) -> u16 {
        self.effect_volume[channel.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_rpm_from_percentage() {
        let mut settings = MixSettings::default();
        settings.max_rpm_percentage = 300;
        assert_eq!(settings.max_rpm(), 300);
        settings.max_rpm_percentage = 50;
        assert_eq!(settings.max_rpm(), IDLE_RPM);
    }
}
