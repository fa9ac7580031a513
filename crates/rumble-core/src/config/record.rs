//! Binary engine config records
//!
//! Every schema generation has its own fixed-size `#[repr(C)]` record. A
//! record always starts with [`RecordHeader`]; the version there selects
//! the struct used to read the rest. Older generations are upgraded one
//! step at a time until they reach [`CONFIG_VERSION`]:
//!
//! ```text
//! V1 (36 B) ──upgrade──► V2 (52 B) ──upgrade──► V3 (64 B, current)
//! ```
//!
//! Records are stored in native byte order.

use bytemuck::{Pod, Zeroable};
use std::mem::size_of;

use super::{ConfigError, ConfigResult, EffectSettings, EngineConfig};
use crate::effects::EffectChannel;
use crate::sound_bank::{HornType, ProfileId};

/// "RMBL"
pub const CONFIG_MAGIC: u32 = 0x524D_424C;

pub const CONFIG_VERSION: u32 = 3;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RecordHeader {
    pub magic: u32,
    pub version: u32,
}

impl RecordHeader {
    const fn current() -> Self {
        Self {
            magic: CONFIG_MAGIC,
            version: CONFIG_VERSION,
        }
    }
}

/// First generation: single master volume, no effects
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RecordV1 {
    pub header: RecordHeader,
    pub master_volume: u16,
    pub idle_volume: u16,
    pub rev_volume: u16,
    pub knock_volume: u16,
    pub start_volume: u16,
    pub max_rpm_percentage: u16,
    pub acceleration: u16,
    pub deceleration: u16,
    pub rev_switch_point: u16,
    pub idle_end_point: u16,
    pub knock_start_point: u16,
    pub profile: u8,
    pub knock_interval: u8,
    pub jake_brake_enabled: u8,
    pub v8_mode: u8,
    pub _reserved: [u8; 2],
}

/// Second generation: effect volumes and switches, turbo whistle
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RecordV2 {
    pub header: RecordHeader,
    pub master_volume: u16,
    pub idle_volume: u16,
    pub rev_volume: u16,
    pub knock_volume: u16,
    pub start_volume: u16,
    pub max_rpm_percentage: u16,
    pub acceleration: u16,
    pub deceleration: u16,
    pub rev_switch_point: u16,
    pub idle_end_point: u16,
    pub knock_start_point: u16,
    pub air_brake_volume: u16,
    pub reverse_beep_volume: u16,
    pub gear_shift_volume: u16,
    pub wastegate_volume: u16,
    pub turbo_volume: u16,
    pub profile: u8,
    pub knock_interval: u8,
    pub jake_brake_enabled: u8,
    pub v8_mode: u8,
    pub air_brake_enabled: u8,
    pub reverse_beep_enabled: u8,
    pub gear_shift_enabled: u8,
    pub wastegate_enabled: u8,
    pub turbo_enabled: u8,
    pub _reserved: [u8; 3],
}

/// Current generation: two master levels, presets, six effect channels, horn
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RecordV3 {
    pub header: RecordHeader,
    pub master_volumes: [u16; 2],
    pub volume_presets: [u16; 3],
    pub idle_volume: u16,
    pub rev_volume: u16,
    pub knock_volume: u16,
    pub start_volume: u16,
    pub max_rpm_percentage: u16,
    pub acceleration: u16,
    pub deceleration: u16,
    pub rev_switch_point: u16,
    pub idle_end_point: u16,
    pub knock_start_point: u16,
    /// Indexed by [`EffectChannel`]
    pub effect_volumes: [u16; EffectChannel::COUNT],
    pub profile: u8,
    pub knock_interval: u8,
    pub jake_brake_enabled: u8,
    pub v8_mode: u8,
    pub active_volume_level: u8,
    pub horn_type: u8,
    pub effect_enabled: [u8; EffectChannel::COUNT],
    pub _reserved: [u8; 2],
}

const _: () = assert!(size_of::<RecordV1>() == 36);
const _: () = assert!(size_of::<RecordV2>() == 52);
const _: () = assert!(size_of::<RecordV3>() == 64);

/// A decoded record of any generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredRecord {
    V1(RecordV1),
    V2(RecordV2),
    V3(RecordV3),
}

impl StoredRecord {
    /// Decode raw bytes, checking magic, version and exact length
    pub fn parse(bytes: &[u8]) -> ConfigResult<Self> {
        let header: RecordHeader = read_pod(bytes.get(..size_of::<RecordHeader>()).unwrap_or(bytes))?;
        if header.magic != CONFIG_MAGIC {
            return Err(ConfigError::Corrupt(format!("bad magic {:#010x}", header.magic)));
        }
        match header.version {
            1 => read_pod(bytes).map(Self::V1),
            2 => read_pod(bytes).map(Self::V2),
            3 => read_pod(bytes).map(Self::V3),
            v => Err(ConfigError::Corrupt(format!("unknown version {v}"))),
        }
    }

    pub fn version(&self) -> u32 {
        match self {
            Self::V1(_) => 1,
            Self::V2(_) => 2,
            Self::V3(_) => 3,
        }
    }

    /// Upgrade step by step to the current generation
    pub fn into_current(self) -> RecordV3 {
        match self {
            Self::V1(v1) => upgrade_v2(&upgrade_v1(&v1)),
            Self::V2(v2) => upgrade_v2(&v2),
            Self::V3(v3) => v3,
        }
    }
}

fn read_pod<T: Pod>(bytes: &[u8]) -> ConfigResult<T> {
    if bytes.len() != size_of::<T>() {
        return Err(ConfigError::Corrupt(format!(
            "record is {} bytes, expected {}",
            bytes.len(),
            size_of::<T>()
        )));
    }
    bytemuck::try_pod_read_unaligned(bytes).map_err(|e| ConfigError::Corrupt(format!("{e:?}")))
}

/// V1 → V2: new effect channels start enabled at the default volume
pub fn upgrade_v1(v1: &RecordV1) -> RecordV2 {
    let fx = EffectSettings::default();
    let on = fx.enabled as u8;
    RecordV2 {
        header: RecordHeader { magic: CONFIG_MAGIC, version: 2 },
        master_volume: v1.master_volume,
        idle_volume: v1.idle_volume,
        rev_volume: v1.rev_volume,
        knock_volume: v1.knock_volume,
        start_volume: v1.start_volume,
        max_rpm_percentage: v1.max_rpm_percentage,
        acceleration: v1.acceleration,
        deceleration: v1.deceleration,
        rev_switch_point: v1.rev_switch_point,
        idle_end_point: v1.idle_end_point,
        knock_start_point: v1.knock_start_point,
        air_brake_volume: fx.volume,
        reverse_beep_volume: fx.volume,
        gear_shift_volume: fx.volume,
        wastegate_volume: fx.volume,
        turbo_volume: fx.volume,
        profile: v1.profile,
        knock_interval: v1.knock_interval,
        jake_brake_enabled: v1.jake_brake_enabled,
        v8_mode: v1.v8_mode,
        air_brake_enabled: on,
        reverse_beep_enabled: on,
        gear_shift_enabled: on,
        wastegate_enabled: on,
        turbo_enabled: 0,
        _reserved: [0; 3],
    }
}

/// V2 → V3: the old master volume becomes level 0, turbo is dropped,
/// the quiet level, presets, mode switch and horn take their defaults
pub fn upgrade_v2(v2: &RecordV2) -> RecordV3 {
    let defaults = EngineConfig::default();
    let fx = EffectSettings::default();
    let mut effect_volumes = [fx.volume; EffectChannel::COUNT];
    let mut effect_enabled = [fx.enabled as u8; EffectChannel::COUNT];
    for (channel, volume, enabled) in [
        (EffectChannel::AirBrake, v2.air_brake_volume, v2.air_brake_enabled),
        (EffectChannel::ReverseBeep, v2.reverse_beep_volume, v2.reverse_beep_enabled),
        (EffectChannel::GearShift, v2.gear_shift_volume, v2.gear_shift_enabled),
        (EffectChannel::Wastegate, v2.wastegate_volume, v2.wastegate_enabled),
    ] {
        effect_volumes[channel.index()] = volume;
        effect_enabled[channel.index()] = enabled;
    }

    RecordV3 {
        header: RecordHeader::current(),
        master_volumes: [v2.master_volume, defaults.master_volumes[1]],
        volume_presets: defaults.volume_presets,
        idle_volume: v2.idle_volume,
        rev_volume: v2.rev_volume,
        knock_volume: v2.knock_volume,
        start_volume: v2.start_volume,
        max_rpm_percentage: v2.max_rpm_percentage,
        acceleration: v2.acceleration,
        deceleration: v2.deceleration,
        rev_switch_point: v2.rev_switch_point,
        idle_end_point: v2.idle_end_point,
        knock_start_point: v2.knock_start_point,
        effect_volumes,
        profile: v2.profile,
        knock_interval: v2.knock_interval,
        jake_brake_enabled: v2.jake_brake_enabled,
        v8_mode: v2.v8_mode,
        active_volume_level: 0,
        horn_type: defaults.horn_type as u8,
        effect_enabled,
        _reserved: [0; 2],
    }
}

impl From<&EngineConfig> for RecordV3 {
    fn from(c: &EngineConfig) -> Self {
        Self {
            header: RecordHeader::current(),
            master_volumes: c.master_volumes,
            volume_presets: c.volume_presets,
            idle_volume: c.idle_volume,
            rev_volume: c.rev_volume,
            knock_volume: c.knock_volume,
            start_volume: c.start_volume,
            max_rpm_percentage: c.max_rpm_percentage,
            acceleration: c.acceleration,
            deceleration: c.deceleration,
            rev_switch_point: c.rev_switch_point,
            idle_end_point: c.idle_end_point,
            knock_start_point: c.knock_start_point,
            effect_volumes: c.effects.map(|e| e.volume),
            profile: c.profile as u8,
            knock_interval: c.knock_interval,
            jake_brake_enabled: c.jake_brake_enabled as u8,
            v8_mode: c.v8_mode as u8,
            active_volume_level: c.active_volume_level,
            horn_type: c.horn_type as u8,
            effect_enabled: c.effects.map(|e| e.enabled as u8),
            _reserved: [0; 2],
        }
    }
}

impl From<&RecordV3> for EngineConfig {
    fn from(r: &RecordV3) -> Self {
        let mut effects = [EffectSettings::default(); EffectChannel::COUNT];
        for (i, fx) in effects.iter_mut().enumerate() {
            fx.enabled = r.effect_enabled[i] != 0;
            fx.volume = r.effect_volumes[i];
        }
        Self {
            profile: ProfileId::from_index(r.profile).unwrap_or_default(),
            master_volumes: r.master_volumes,
            active_volume_level: r.active_volume_level,
            volume_presets: r.volume_presets,
            idle_volume: r.idle_volume,
            rev_volume: r.rev_volume,
            knock_volume: r.knock_volume,
            start_volume: r.start_volume,
            max_rpm_percentage: r.max_rpm_percentage,
            acceleration: r.acceleration,
            deceleration: r.deceleration,
            rev_switch_point: r.rev_switch_point,
            idle_end_point: r.idle_end_point,
            knock_start_point: r.knock_start_point,
            knock_interval: r.knock_interval,
            jake_brake_enabled: r.jake_brake_enabled != 0,
            v8_mode: r.v8_mode != 0,
            effects,
            horn_type: HornType::from_index(r.horn_type).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_record() -> RecordV1 {
        RecordV1 {
            header: RecordHeader { magic: CONFIG_MAGIC, version: 1 },
            master_volume: 55,
            idle_volume: 90,
            rev_volume: 70,
            knock_volume: 60,
            start_volume: 80,
            max_rpm_percentage: 320,
            acceleration: 3,
            deceleration: 2,
            rev_switch_point: 130,
            idle_end_point: 400,
            knock_start_point: 140,
            profile: ProfileId::ManKat as u8,
            knock_interval: 8,
            jake_brake_enabled: 1,
            v8_mode: 0,
            _reserved: [0; 2],
        }
    }

    #[test]
    fn test_parse_dispatches_on_version() {
        let v1 = v1_record();
        let parsed = StoredRecord::parse(bytemuck::bytes_of(&v1)).unwrap();
        assert_eq!(parsed, StoredRecord::V1(v1));
        assert_eq!(parsed.version(), 1);

        let v3 = RecordV3::from(&EngineConfig::default());
        assert_eq!(StoredRecord::parse(bytemuck::bytes_of(&v3)).unwrap(), StoredRecord::V3(v3));
    }

    #[test]
    fn test_parse_rejects_bad_records() {
        let mut v3 = RecordV3::from(&EngineConfig::default());
        let bytes = bytemuck::bytes_of(&v3);
        assert!(matches!(StoredRecord::parse(&bytes[..40]), Err(ConfigError::Corrupt(_))));
        assert!(matches!(StoredRecord::parse(&bytes[..3]), Err(ConfigError::Corrupt(_))));
        assert!(matches!(StoredRecord::parse(&[]), Err(ConfigError::Corrupt(_))));

        v3.header.magic = 0xDEAD_BEEF;
        assert!(matches!(StoredRecord::parse(bytemuck::bytes_of(&v3)), Err(ConfigError::Corrupt(_))));

        v3.header = RecordHeader { magic: CONFIG_MAGIC, version: 9 };
        assert!(matches!(StoredRecord::parse(bytemuck::bytes_of(&v3)), Err(ConfigError::Corrupt(_))));
    }

    #[test]
    fn test_v1_upgrade_preserves_fields_and_defaults_new_ones() {
        let v1 = v1_record();
        let v3 = StoredRecord::V1(v1).into_current();
        let defaults = EngineConfig::default();

        assert_eq!(v3.header, RecordHeader::current());
        assert_eq!(v3.master_volumes[0], 55);
        assert_eq!(v3.idle_volume, 90);
        assert_eq!(v3.max_rpm_percentage, 320);
        assert_eq!(v3.profile, ProfileId::ManKat as u8);
        assert_eq!(v3.v8_mode, 0);

        assert_eq!(v3.master_volumes[1], defaults.master_volumes[1]);
        assert_eq!(v3.volume_presets, defaults.volume_presets);
        assert_eq!(v3.active_volume_level, 0);
        assert_eq!(v3.effect_volumes, [EffectSettings::default().volume; EffectChannel::COUNT]);
        assert_eq!(v3.effect_enabled, [1; EffectChannel::COUNT]);
        assert_eq!(v3.horn_type, defaults.horn_type as u8);
    }

    #[test]
    fn test_v2_upgrade_carries_effect_settings() {
        let mut v2 = upgrade_v1(&v1_record());
        v2.wastegate_volume = 150;
        v2.reverse_beep_enabled = 0;
        v2.turbo_volume = 199;
        let v3 = upgrade_v2(&v2);
        assert_eq!(v3.effect_volumes[EffectChannel::Wastegate.index()], 150);
        assert_eq!(v3.effect_enabled[EffectChannel::ReverseBeep.index()], 0);
        assert_eq!(v3.effect_enabled[EffectChannel::Horn.index()], 1);
    }

    #[test]
    fn test_config_record_round_trip() {
        let mut config = EngineConfig {
            profile: ProfileId::UnimogU1000,
            active_volume_level: 1,
            horn_type: HornType::Compact,
            ..EngineConfig::default()
        };
        config.effects[EffectChannel::GearShift.index()] = EffectSettings { enabled: false, volume: 33 };
        let record = RecordV3::from(&config);
        assert_eq!(EngineConfig::from(&record), config);
    }
}
