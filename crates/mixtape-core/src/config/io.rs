//! YAML configuration I/O
//!
//! Loading never fails: a missing or unreadable file gives the type's
//! defaults. Saving reports errors with the offending path attached.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load a configuration file, falling back to `T::default()`
///
/// A file that exists but does not parse is logged and ignored.
///
/// ```ignore
/// let config: MixtapeConfig = load_config(&default_config_path());
/// ```
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("load_config: {:?} not found, using defaults", path);
        return T::default();
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            log::warn!("load_config: failed to read {:?}: {}, using defaults", path, e);
            return T::default();
        }
    };

    match serde_yaml::from_str::<T>(&contents) {
        Ok(config) => {
            log::info!("load_config: loaded {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("load_config: failed to parse {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Save a configuration file, creating parent directories
///
/// The YAML is written next to the target and renamed over it, so a crash
/// mid-write never leaves a truncated config behind.
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    let staging = path.with_extension("yaml.tmp");
    std::fs::write(&staging, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", staging))?;
    std::fs::rename(&staging, path)
        .with_context(|| format!("Failed to replace config file: {:?}", path))?;

    log::info!("save_config: saved {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MixtapeConfig;

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config: MixtapeConfig = load_config(Path::new("/nonexistent/path/mixtape-config.yaml"));
        assert_eq!(config, MixtapeConfig::default());
    }

    #[test]
    fn test_invalid_yaml_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "timeline: [not, a, map").unwrap();
        let config: MixtapeConfig = load_config(&path);
        assert_eq!(config, MixtapeConfig::default());
    }

    #[test]
    fn test_roundtrip_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mixtape-config.yaml");

        let mut config = MixtapeConfig::default();
        config.timeline.lane_count = 4;
        config.editor.undo_limit = 7;

        save_config(&config, &path).unwrap();
        let loaded: MixtapeConfig = load_config(&path);

        assert_eq!(loaded, config);
        assert!(!path.with_extension("yaml.tmp").exists());
    }
}
