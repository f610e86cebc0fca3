//! Edit session settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::undo::DEFAULT_UNDO_LIMIT;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Undo entries kept before the oldest are dropped
    /// Default: 100
    pub undo_limit: usize,

    /// Coalescing window for external change notifications (ms)
    /// Default: 200
    pub debounce_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            undo_limit: DEFAULT_UNDO_LIMIT,
            debounce_ms: 200,
        }
    }
}

impl EditorConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn sanitized(&self) -> Self {
        Self {
            undo_limit: self.undo_limit.max(1),
            debounce_ms: self.debounce_ms.clamp(10, 10_000),
        }
    }
}
