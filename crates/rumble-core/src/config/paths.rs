//! Standard locations for engine config files

use std::path::PathBuf;

/// Per-user config directory
///
/// Returns: `<platform config dir>/rumble`, or `./rumble` if the platform
/// has none.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rumble")
}

/// A file inside [`default_config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_rumble() {
        assert!(default_config_dir().ends_with("rumble"));
    }

    #[test]
    fn test_config_path_includes_filename() {
        let path = default_config_path("engine.yaml");
        assert!(path.ends_with("engine.yaml"));
    }
}
