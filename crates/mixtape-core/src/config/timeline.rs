//! Timeline geometry settings
//!
//! Pixel constants are in CSS pixels at zoom 1; the renderer multiplies by
//! its own pixel ratio.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Pixels per second before the width scale and zoom apply
    /// Default: 80
    pub base_px_per_sec: f64,

    /// Global horizontal compression of the mixtape view
    /// Default: 0.1 (8 px per second at zoom 1)
    pub width_scale: f64,

    /// Default: 0.1
    pub zoom_min: f64,
    /// Default: 3.0
    pub zoom_max: f64,
    /// Spacing of the discrete zoom levels tiles are rendered at
    /// Default: 0.2
    pub render_zoom_step: f64,

    /// Default: 2
    pub lane_count: usize,
    /// Default: 144
    pub lane_height: f64,
    /// Vertical gap between lanes
    /// Default: 8
    pub lane_gap: f64,
    /// Space above the first lane
    /// Default: 12
    pub lane_padding_top: f64,

    /// Narrowest a track is drawn
    /// Default: 6
    pub min_track_width: f64,
    /// Width of a track whose duration is unknown
    /// Default: 12
    pub fallback_track_width: f64,
    /// Horizontal gap between consecutive tracks in a lane
    /// Default: 0
    pub track_gap_px: f64,

    /// Width of one waveform render tile
    /// Default: 1200
    pub tile_width: u32,
    /// Pre-render reach on each side, as a multiple of the viewport width
    /// Default: 1.2
    pub pre_render_buffer: f64,
    /// Rendered tiles kept before the least recently used go
    /// Default: 512
    pub tile_cache_limit: usize,

    /// Below this zoom only bar lines are drawn
    /// Default: 0.6
    pub grid_bar_only_zoom: f64,
    /// From this zoom every 4th beat is drawn
    /// Default: 0.6
    pub grid_beat4_zoom: f64,
    /// From this zoom every beat is drawn
    /// Default: 1.5
    pub grid_beat_zoom: f64,
    /// Bar line width at minimum zoom
    /// Default: 1.6
    pub grid_bar_width_min: f64,
    /// Default: 2.6
    pub grid_bar_width_max: f64,
    /// Zoom at which bar lines reach full width
    /// Default: 1.2
    pub grid_bar_width_max_zoom: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            base_px_per_sec: 80.0,
            width_scale: 0.1,
            zoom_min: 0.1,
            zoom_max: 3.0,
            render_zoom_step: 0.2,
            lane_count: 2,
            lane_height: 144.0,
            lane_gap: 8.0,
            lane_padding_top: 12.0,
            min_track_width: 6.0,
            fallback_track_width: 12.0,
            track_gap_px: 0.0,
            tile_width: 1200,
            pre_render_buffer: 1.2,
            tile_cache_limit: 512,
            grid_bar_only_zoom: 0.6,
            grid_beat4_zoom: 0.6,
            grid_beat_zoom: 1.5,
            grid_bar_width_min: 1.6,
            grid_bar_width_max: 2.6,
            grid_bar_width_max_zoom: 1.2,
        }
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

fn non_negative_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        fallback
    }
}

impl TimelineConfig {
    /// Copy with every value usable: positive scales, ordered zoom range,
    /// at least one lane and a non-empty tile
    pub fn sanitized(&self) -> Self {
        let d = Self::default();
        let zoom_min = positive_or(self.zoom_min, d.zoom_min);
        let zoom_max = positive_or(self.zoom_max, d.zoom_max).max(zoom_min);
        Self {
            base_px_per_sec: positive_or(self.base_px_per_sec, d.base_px_per_sec),
            width_scale: positive_or(self.width_scale, d.width_scale),
            zoom_min,
            zoom_max,
            render_zoom_step: positive_or(self.render_zoom_step, d.render_zoom_step),
            lane_count: self.lane_count.max(1),
            lane_height: positive_or(self.lane_height, d.lane_height),
            lane_gap: non_negative_or(self.lane_gap, d.lane_gap),
            lane_padding_top: non_negative_or(self.lane_padding_top, d.lane_padding_top),
            min_track_width: non_negative_or(self.min_track_width, d.min_track_width),
            fallback_track_width: positive_or(self.fallback_track_width, d.fallback_track_width),
            track_gap_px: non_negative_or(self.track_gap_px, d.track_gap_px),
            tile_width: self.tile_width.max(1),
            pre_render_buffer: non_negative_or(self.pre_render_buffer, d.pre_render_buffer),
            tile_cache_limit: self.tile_cache_limit.max(1),
            grid_bar_only_zoom: non_negative_or(self.grid_bar_only_zoom, d.grid_bar_only_zoom),
            grid_beat4_zoom: non_negative_or(self.grid_beat4_zoom, d.grid_beat4_zoom),
            grid_beat_zoom: non_negative_or(self.grid_beat_zoom, d.grid_beat_zoom),
            grid_bar_width_min: positive_or(self.grid_bar_width_min, d.grid_bar_width_min),
            grid_bar_width_max: positive_or(self.grid_bar_width_max, d.grid_bar_width_max),
            grid_bar_width_max_zoom: positive_or(self.grid_bar_width_max_zoom, d.grid_bar_width_max_zoom),
        }
    }

    /// Vertical extent of all lanes including the top padding
    pub fn lanes_height(&self) -> f64 {
        let lanes = self.lane_count.max(1) as f64;
        self.lane_padding_top + lanes * self.lane_height + (lanes - 1.0) * self.lane_gap
    }

    /// Top edge of a lane
    pub fn lane_top(&self, lane_index: usize) -> f64 {
        self.lane_padding_top + lane_index as f64 * (self.lane_height + self.lane_gap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_repairs_nonsense() {
        let broken = TimelineConfig {
            zoom_min: -1.0,
            zoom_max: 0.05,
            lane_count: 0,
            tile_width: 0,
            base_px_per_sec: f64::NAN,
            ..TimelineConfig::default()
        };
        let fixed = broken.sanitized();
        assert_eq!(fixed.zoom_min, 0.1);
        assert_eq!(fixed.zoom_max, 0.1);
        assert_eq!(fixed.lane_count, 1);
        assert_eq!(fixed.tile_width, 1);
        assert_eq!(fixed.base_px_per_sec, 80.0);
        assert_eq!(TimelineConfig::default().sanitized(), TimelineConfig::default());
    }

    #[test]
    fn test_lane_geometry() {
        let config = TimelineConfig::default();
        assert_eq!(config.lane_top(0), 12.0);
        assert_eq!(config.lane_top(1), 12.0 + 144.0 + 8.0);
        assert_eq!(config.lanes_height(), 12.0 + 2.0 * 144.0 + 8.0);
    }
}
