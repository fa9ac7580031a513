//! YAML import/export
//!
//! The binary record is what the engine persists; YAML is for people:
//! editing a config by hand, sharing one, or feeding one to the simulator.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use super::EngineConfig;

/// Load any YAML document, falling back to defaults
///
/// A missing or unparsable file logs and yields `T::default()`.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("load_config: {:?} doesn't exist, using defaults", path);
        return T::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<T>(&contents) {
            Ok(config) => {
                log::info!("load_config: Loaded {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("load_config: Failed to parse {:?}: {}, using defaults", path, e);
                T::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: Failed to read {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Write any serializable value as YAML, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("save_config: Saved {:?}", path);
    Ok(())
}

/// Read an engine config from YAML, rejecting out-of-range values
///
/// Unlike [`load_config`] this fails loudly: an import the user asked for
/// should not silently turn into defaults.
pub fn import_config(path: &Path) -> Result<EngineConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read engine config: {:?}", path))?;
    let config: EngineConfig =
        serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse engine config: {:?}", path))?;
    config
        .validate()
        .with_context(|| format!("Engine config {:?} is out of range", path))?;
    Ok(config)
}

/// Write an engine config as YAML
pub fn export_config(config: &EngineConfig, path: &Path) -> Result<()> {
    save_config(config, path)
}
