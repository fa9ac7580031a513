//! Engine configuration
//!
//! - [`EngineConfig`]: the user-facing settings, `serde`-serializable
//! - [`record`]: fixed-size binary records, one per schema generation
//! - [`store`]: load with migration, save at the current version
//! - [`persist`]: debounced background writer
//!
//! # Usage
//!
//! ```ignore
//! let mut storage = FileStorage::new(default_config_dir())?;
//! let (config, outcome) = load_engine_config(&mut storage, ENGINE_CONFIG_KEY);
//! let persist = PersistHandle::spawn(Box::new(storage), ENGINE_CONFIG_KEY, DEFAULT_DEBOUNCE)?;
//! ```

mod error;
mod io;
mod paths;
mod persist;
pub mod record;
mod storage;
mod store;

pub use error::{ConfigError, ConfigResult, StorageError};
pub use io::{export_config, import_config, load_config, save_config};
pub use paths::{default_config_dir, default_config_path};
pub use persist::{PersistHandle, DEFAULT_DEBOUNCE};
pub use storage::{ConfigStorage, FileStorage, MemoryStorage};
pub use store::{load_engine_config, save_engine_config, LoadOutcome, ENGINE_CONFIG_KEY};

use serde::{Deserialize, Serialize};

use crate::effects::EffectChannel;
use crate::mixer::MixSettings;
use crate::sound_bank::{HornType, ProfileId};

/// Number of stored master volume presets
pub const VOLUME_PRESET_COUNT: usize = 3;

/// Upper bound for every percent volume
pub const MAX_VOLUME: u16 = 200;

/// Allowed max-RPM percentages
pub const MAX_RPM_PERCENTAGE_RANGE: std::ops::RangeInclusive<u16> = 150..=500;

/// Allowed acceleration/deceleration steps
pub const RPM_RATE_RANGE: std::ops::RangeInclusive<u16> = 1..=50;

/// Allowed knock intervals (cylinders per idle loop)
pub const KNOCK_INTERVAL_RANGE: std::ops::RangeInclusive<u8> = 1..=16;

/// Per-channel effect settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    pub enabled: bool,
    /// Percent, 0..=200
    pub volume: u16,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 70,
        }
    }
}

/// Engine sound configuration
///
/// Everything persisted across power cycles. Volumes are percentages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Selected sound profile
    pub profile: ProfileId,

    /// Two master levels (normal, quiet) switched by toggle_volume_level()
    pub master_volumes: [u16; 2],

    /// Index into `master_volumes`
    pub active_volume_level: u8,

    /// Master volume presets loaded by set_volume_preset()
    pub volume_presets: [u16; VOLUME_PRESET_COUNT],

    pub idle_volume: u16,
    pub rev_volume: u16,
    pub knock_volume: u16,
    pub start_volume: u16,

    /// RPM limiter as percent of idle RPM
    pub max_rpm_percentage: u16,

    /// Minimum RPM rise per smoothing step
    pub acceleration: u16,

    /// Minimum RPM fall per smoothing step
    pub deceleration: u16,

    /// RPM where the rev layer starts fading in
    pub rev_switch_point: u16,

    /// RPM where the idle layer is gone
    pub idle_end_point: u16,

    /// Knocks are only layered at or above this RPM
    pub knock_start_point: u16,

    /// Knocks per idle loop; set to the cylinder count on profile change
    pub knock_interval: u8,

    pub jake_brake_enabled: bool,

    /// Accent the V8 firing order
    pub v8_mode: bool,

    /// Indexed by [`EffectChannel`]
    pub effects: [EffectSettings; EffectChannel::COUNT],

    pub horn_type: HornType,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profile: ProfileId::default(),
            master_volumes: [100, 40],
            active_volume_level: 0,
            volume_presets: [30, 70, 100],
            idle_volume: 100,
            rev_volume: 80,
            knock_volume: 80,
            start_volume: 90,
            max_rpm_percentage: 300,
            acceleration: 2,
            deceleration: 1,
            rev_switch_point: 120,
            idle_end_point: 450,
            knock_start_point: 150,
            knock_interval: 8,
            jake_brake_enabled: true,
            v8_mode: true,
            effects: [EffectSettings::default(); EffectChannel::COUNT],
            horn_type: HornType::default(),
        }
    }
}

impl EngineConfig {
    /// Master volume currently in effect
    pub fn master_volume(&self) -> u16 {
        self.master_volumes[(self.active_volume_level & 1) as usize]
    }

    pub fn effect(&self, channel: EffectChannel) -> &EffectSettings {
        &self.effects[channel.index()]
    }

    /// Check every field against its range
    pub fn validate(&self) -> ConfigResult<()> {
        let layers = [self.idle_volume, self.rev_volume, self.knock_volume, self.start_volume];
        let mut volumes = self
            .master_volumes
            .iter()
            .chain(&self.volume_presets)
            .chain(&layers)
            .copied()
            .chain(self.effects.iter().map(|e| e.volume));
        if let Some(v) = volumes.find(|&v| v > MAX_VOLUME) {
            return Err(ConfigError::Invalid(format!("volume {v} above {MAX_VOLUME}")));
        }
        if self.active_volume_level > 1 {
            return Err(ConfigError::Invalid(format!(
                "volume level {} (expected 0 or 1)",
                self.active_volume_level
            )));
        }
        if !MAX_RPM_PERCENTAGE_RANGE.contains(&self.max_rpm_percentage) {
            return Err(ConfigError::Invalid(format!(
                "max rpm percentage {} outside {:?}",
                self.max_rpm_percentage, MAX_RPM_PERCENTAGE_RANGE
            )));
        }
        for (name, rate) in [("acceleration", self.acceleration), ("deceleration", self.deceleration)] {
            if !RPM_RATE_RANGE.contains(&rate) {
                return Err(ConfigError::Invalid(format!("{name} {rate} outside {RPM_RATE_RANGE:?}")));
            }
        }
        if self.rev_switch_point >= self.idle_end_point {
            return Err(ConfigError::Invalid(format!(
                "rev switch point {} must be below idle end point {}",
                self.rev_switch_point, self.idle_end_point
            )));
        }
        if !KNOCK_INTERVAL_RANGE.contains(&self.knock_interval) {
            return Err(ConfigError::Invalid(format!(
                "knock interval {} outside {:?}",
                self.knock_interval, KNOCK_INTERVAL_RANGE
            )));
        }
        Ok(())
    }
}

impl From<&EngineConfig> for MixSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            master_volume: config.master_volume(),
            idle_volume: config.idle_volume,
            rev_volume: config.rev_volume,
            knock_volume: config.knock_volume,
            start_volume: config.start_volume,
            max_rpm_percentage: config.max_rpm_percentage,
            acceleration: config.acceleration,
            deceleration: config.deceleration,
            rev_switch_point: config.rev_switch_point,
            idle_end_point: config.idle_end_point,
            knock_start_point: config.knock_start_point,
            knock_interval: config.knock_interval,
            v8_mode: config.v8_mode,
            jake_brake_enabled: config.jake_brake_enabled,
            effect_enabled: config.effects.map(|e| e.enabled),
            effect_volume: config.effects.map(|e| e.volume),
            horn: config.horn_type,
        }
    }
}

impl Default for MixSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let cases: Vec<Box<dyn Fn(&mut EngineConfig)>> = vec![
            Box::new(|c| c.idle_volume = 201),
            Box::new(|c| c.effects[3].volume = 500),
            Box::new(|c| c.active_volume_level = 2),
            Box::new(|c| c.max_rpm_percentage = 100),
            Box::new(|c| c.acceleration = 0),
            Box::new(|c| c.deceleration = 51),
            Box::new(|c| c.rev_switch_point = c.idle_end_point),
            Box::new(|c| c.knock_interval = 0),
        ];
        for mutate in cases {
            let mut config = EngineConfig::default();
            mutate(&mut config);
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))), "{config:?}");
        }
    }

    #[test]
    fn test_effect_volume_shares_the_volume_ceiling() {
        let mut config = EngineConfig::default();
        config.effects[2].volume = MAX_VOLUME;
        config.validate().unwrap();
        config.effects[2].volume = MAX_VOLUME + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_mix_settings_follow_active_level() {
        let mut config = EngineConfig::default();
        assert_eq!(MixSettings::from(&config).master_volume, 100);
        config.active_volume_level = 1;
        assert_eq!(MixSettings::from(&config).master_volume, 40);
        config.effects[EffectChannel::Horn.index()].enabled = false;
        let settings = MixSettings::from(&config);
        assert!(!settings.effect_enabled(EffectChannel::Horn));
        assert!(settings.effect_enabled(EffectChannel::AirBrake));
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: EngineConfig = serde_yaml::from_str("profile: man_kat\nidle_volume: 50\n").unwrap();
        assert_eq!(config.profile, ProfileId::ManKat);
        assert_eq!(config.idle_volume, 50);
        assert_eq!(config.rev_volume, EngineConfig::default().rev_volume);
    }
}
