//! Load with migration, save at the current version

use super::record::{RecordV3, StoredRecord, CONFIG_VERSION};
use super::{ConfigResult, ConfigStorage, EngineConfig, StorageError};

/// Storage key of the engine record
pub const ENGINE_CONFIG_KEY: &str = "engine";

/// How load_engine_config() arrived at its result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Current-version record read as is
    Loaded,
    /// Nothing stored yet; defaults written
    NotFound,
    /// Older record upgraded and written back
    Migrated { from: u32 },
    /// Record unusable; defaults used
    Defaulted { reason: String },
}

/// Load the engine config, migrating or defaulting as needed
///
/// Never fails: problems are logged and resolved to a usable config. Any
/// upgraded or replaced record is written back immediately.
pub fn load_engine_config<S>(storage: &mut S, key: &str) -> (EngineConfig, LoadOutcome)
where
    S: ConfigStorage + ?Sized,
{
    let bytes = match storage.load(key) {
        Ok(bytes) => bytes,
        Err(StorageError::NotFound(_)) => {
            log::info!("No stored engine config, using defaults");
            let config = EngineConfig::default();
            write_back(storage, key, &config);
            return (config, LoadOutcome::NotFound);
        }
        Err(e) => {
            // Leave the stored record alone; it may be readable next time
            log::warn!("Failed to read engine config: {}, using defaults", e);
            return (EngineConfig::default(), LoadOutcome::Defaulted { reason: e.to_string() });
        }
    };

    let record = match StoredRecord::parse(&bytes) {
        Ok(record) => record,
        Err(e) => return reset_to_defaults(storage, key, e.to_string()),
    };

    let from = record.version();
    let config = EngineConfig::from(&record.into_current());
    if let Err(e) = config.validate() {
        return reset_to_defaults(storage, key, e.to_string());
    }

    if from == CONFIG_VERSION {
        log::info!("Loaded engine config ({})", config.profile.name());
        (config, LoadOutcome::Loaded)
    } else {
        log::warn!("Migrated engine config from v{} to v{}", from, CONFIG_VERSION);
        write_back(storage, key, &config);
        (config, LoadOutcome::Migrated { from })
    }
}

/// Write `config` as a current-version record
pub fn save_engine_config<S>(storage: &mut S, key: &str, config: &EngineConfig) -> ConfigResult<()>
where
    S: ConfigStorage + ?Sized,
{
    let record = RecordV3::from(config);
    storage.save(key, bytemuck::bytes_of(&record))?;
    Ok(())
}

fn reset_to_defaults<S>(storage: &mut S, key: &str, reason: String) -> (EngineConfig, LoadOutcome)
where
    S: ConfigStorage + ?Sized,
{
    log::warn!("Stored engine config unusable ({}), using defaults", reason);
    let config = EngineConfig::default();
    write_back(storage, key, &config);
    (config, LoadOutcome::Defaulted { reason })
}

fn write_back<S>(storage: &mut S, key: &str, config: &EngineConfig)
where
    S: ConfigStorage + ?Sized,
{
    if let Err(e) = save_engine_config(storage, key, config) {
        log::warn!("Failed to write engine config: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::record::{RecordHeader, RecordV1, CONFIG_MAGIC};
    use crate::config::{FileStorage, MemoryStorage};
    use crate::sound_bank::ProfileId;

    fn v1_bytes(master_volume: u16) -> Vec<u8> {
        let record = RecordV1 {
            header: RecordHeader { magic: CONFIG_MAGIC, version: 1 },
            master_volume,
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
            profile: ProfileId::UnimogU1000 as u8,
            knock_interval: 6,
            jake_brake_enabled: 1,
            v8_mode: 0,
            _reserved: [0; 2],
        };
        bytemuck::bytes_of(&record).to_vec()
    }

    #[test]
    fn test_missing_record_writes_defaults() {
        let mut storage = MemoryStorage::new();
        let (config, outcome) = load_engine_config(&mut storage, ENGINE_CONFIG_KEY);
        assert_eq!(outcome, LoadOutcome::NotFound);
        assert_eq!(config, EngineConfig::default());
        assert_eq!(storage.writes(), 1);

        let (_, outcome) = load_engine_config(&mut storage, ENGINE_CONFIG_KEY);
        assert_eq!(outcome, LoadOutcome::Loaded);
    }

    #[test]
    fn test_save_load_round_trip_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path()).unwrap();
        let config = EngineConfig {
            profile: ProfileId::ManKat,
            master_volumes: [120, 25],
            active_volume_level: 1,
            idle_volume: 77,
            ..EngineConfig::default()
        };

        save_engine_config(&mut storage, ENGINE_CONFIG_KEY, &config).unwrap();
        let first = storage.load(ENGINE_CONFIG_KEY).unwrap();

        let (loaded, outcome) = load_engine_config(&mut storage, ENGINE_CONFIG_KEY);
        assert_eq!(outcome, LoadOutcome::Loaded);
        assert_eq!(loaded, config);

        save_engine_config(&mut storage, ENGINE_CONFIG_KEY, &loaded).unwrap();
        assert_eq!(storage.load(ENGINE_CONFIG_KEY).unwrap(), first);
    }

    #[test]
    fn test_v1_record_is_migrated_and_persisted() {
        let mut storage = MemoryStorage::new();
        storage.insert(ENGINE_CONFIG_KEY, &v1_bytes(65));

        let (config, outcome) = load_engine_config(&mut storage, ENGINE_CONFIG_KEY);
        assert_eq!(outcome, LoadOutcome::Migrated { from: 1 });
        assert_eq!(config.master_volumes[0], 65);
        assert_eq!(config.profile, ProfileId::UnimogU1000);
        assert!(!config.v8_mode);

        let defaults = EngineConfig::default();
        assert_eq!(config.master_volumes[1], defaults.master_volumes[1]);
        assert_eq!(config.volume_presets, defaults.volume_presets);
        assert_eq!(config.effects, defaults.effects);
        assert_eq!(config.horn_type, defaults.horn_type);

        let stored = StoredRecord::parse(&storage.get(ENGINE_CONFIG_KEY).unwrap()).unwrap();
        assert_eq!(stored.version(), CONFIG_VERSION);
        assert_eq!(storage.writes(), 1);
    }

    #[test]
    fn test_corrupt_record_is_replaced_by_defaults() {
        let mut storage = MemoryStorage::new();
        storage.insert(ENGINE_CONFIG_KEY, b"not a record");
        let (config, outcome) = load_engine_config(&mut storage, ENGINE_CONFIG_KEY);
        assert!(matches!(outcome, LoadOutcome::Defaulted { .. }));
        assert_eq!(config, EngineConfig::default());

        let (_, outcome) = load_engine_config(&mut storage, ENGINE_CONFIG_KEY);
        assert_eq!(outcome, LoadOutcome::Loaded);
    }

    #[test]
    fn test_out_of_range_record_is_defaulted() {
        let mut storage = MemoryStorage::new();
        let config = EngineConfig {
            max_rpm_percentage: 9000,
            ..EngineConfig::default()
        };
        save_engine_config(&mut storage, ENGINE_CONFIG_KEY, &config).unwrap();
        let (loaded, outcome) = load_engine_config(&mut storage, ENGINE_CONFIG_KEY);
        assert!(matches!(outcome, LoadOutcome::Defaulted { .. }));
        assert_eq!(loaded, EngineConfig::default());
    }
}
