//! Mixtape configuration
//!
//! - Generic YAML config loading/saving
//! - Default config location
//! - Timeline geometry and editor settings
//!
//! # Usage
//!
//! ```ignore
//! use mixtape_core::config::{default_config_path, load_config, MixtapeConfig};
//!
//! let config: MixtapeConfig = load_config(&default_config_path());
//! ```

mod editor;
mod io;
mod paths;
mod timeline;

pub use editor::EditorConfig;
pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path, CONFIG_FILE_NAME};
pub use timeline::TimelineConfig;

use serde::{Deserialize, Serialize};

/// Everything persisted in `mixtape-config.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixtapeConfig {
    pub timeline: TimelineConfig,
    pub editor: EditorConfig,
}

impl MixtapeConfig {
    /// Copy with out-of-range values pulled back to usable ones
    pub fn sanitized(&self) -> Self {
        Self {
            timeline: self.timeline.sanitized(),
            editor: self.editor.sanitized(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "timeline:\n  lane_count: 3\neditor:\n  undo_limit: 20\n";
        let config: MixtapeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.timeline.lane_count, 3);
        assert_eq!(config.timeline.tile_width, TimelineConfig::default().tile_width);
        assert_eq!(config.editor.undo_limit, 20);
        assert_eq!(config.editor.debounce_ms, EditorConfig::default().debounce_ms);
    }
}
