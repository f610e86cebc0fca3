//! Default location of the mixtape configuration file

use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = "mixtape-config.yaml";

/// Platform config directory for the mixtape
///
/// Returns `<config_dir>/mixtape`, e.g. `~/.config/mixtape` on Linux. Falls
/// back to the working directory when the platform has no config dir.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mixtape")
}

/// Returns `<config_dir>/mixtape/mixtape-config.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join(CONFIG_FILE_NAME)
}
