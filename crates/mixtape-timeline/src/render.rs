//! Render payload
//!
//! The per-frame description handed to the external renderer: canvas
//! geometry, the zoom it was built at and the visible tracks with their lane
//! positions. The renderer draws waveforms from tiles it receives separately.

use serde::Serialize;

use mixtape_core::config::TimelineConfig;

use crate::layout::TimelineLayout;
use crate::zoom::buffer_id;

/// Monotonic render generation
///
/// Every tile result carries the version it was planned at; results from an
/// older version are discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderVersion(u64);

impl RenderVersion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0
    }

    /// Advance to the next generation and return it
    pub fn bump(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(1);
        self.0
    }
}

/// Visible canvas, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineViewport {
    pub width: f64,
    pub height: f64,
    pub scroll_left: f64,
    pub scroll_top: f64,
    /// Device pixels per CSS pixel
    pub pixel_ratio: f64,
}

impl Default for TimelineViewport {
    fn default() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            scroll_left: 0.0,
            scroll_top: 0.0,
            pixel_ratio: 1.0,
        }
    }
}

impl TimelineViewport {
    /// Pixel ratio usable as a divisor
    pub fn effective_pixel_ratio(&self) -> f64 {
        if self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0 {
            self.pixel_ratio
        } else {
            1.0
        }
    }
}

/// One visible track as the renderer sees it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRenderTrack {
    pub id: String,
    pub file_path: String,
    pub duration_seconds: f64,
    pub track_width: f64,
    pub start_x: f64,
    pub lane_index: usize,
    /// Top edge relative to the viewport
    pub track_y: f64,
    pub bpm: Option<f64>,
    pub first_beat_ms: Option<f64>,
    pub bar_beat_offset: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRenderPayload {
    pub width: f64,
    pub height: f64,
    pub pixel_ratio: f64,
    pub zoom: f64,
    pub render_px_per_sec: f64,
    pub lane_height: f64,
    pub lane_gap: f64,
    pub lane_padding_top: f64,
    /// Timeline x at the viewport's left edge
    pub start_x: f64,
    /// Timeline y at the viewport's top edge
    pub start_y: f64,
    pub buffer_id: String,
    pub show_grid_lines: bool,
    pub allow_tile_build: bool,
    pub render_version: u64,
    pub total_width: f64,
    pub tracks: Vec<TimelineRenderTrack>,
}

/// Flags that do not come from geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderFlags {
    pub show_grid_lines: bool,
    /// Cleared while the user is dragging so only cached tiles are drawn
    pub allow_tile_build: bool,
}

impl Default for RenderFlags {
    fn default() -> Self {
        Self {
            show_grid_lines: true,
            allow_tile_build: true,
        }
    }
}

/// Build the payload for the tracks visible in `viewport`
pub fn build_render_payload(
    layout: &TimelineLayout,
    viewport: &TimelineViewport,
    render_version: u64,
    flags: RenderFlags,
    config: &TimelineConfig,
) -> TimelineRenderPayload {
    let width = viewport.width.max(0.0);
    let start_x = viewport.scroll_left.max(0.0);
    let start_y = viewport.scroll_top.max(0.0);

    let tracks = layout
        .visible_items(start_x, start_x + width)
        .map(|item| TimelineRenderTrack {
            id: item.track.id.clone(),
            file_path: item.track.file_path.clone(),
            duration_seconds: item.duration_seconds,
            track_width: item.width,
            start_x: item.start_x,
            lane_index: item.lane_index,
            track_y: config.lane_top(item.lane_index) - start_y,
            bpm: item.track.bpm,
            first_beat_ms: item.track.first_beat_ms,
            bar_beat_offset: item.track.bar_beat_offset,
        })
        .collect();

    TimelineRenderPayload {
        width,
        height: viewport.height.max(0.0),
        pixel_ratio: viewport.effective_pixel_ratio(),
        zoom: layout.zoom,
        render_px_per_sec: layout.px_per_sec,
        lane_height: config.lane_height,
        lane_gap: config.lane_gap,
        lane_padding_top: config.lane_padding_top,
        start_x,
        start_y,
        buffer_id: buffer_id(layout.zoom),
        show_grid_lines: flags.show_grid_lines,
        allow_tile_build: flags.allow_tile_build,
        render_version,
        total_width: layout.total_width,
        tracks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tests::track;
    use crate::layout::{build_layout, LaneAssignment};

    #[test]
    fn test_version_bumps() {
        let mut version = RenderVersion::new();
        assert_eq!(version.current(), 0);
        assert_eq!(version.bump(), 1);
        assert_eq!(version.bump(), 2);
        assert_eq!(version.current(), 2);
    }

    #[test]
    fn test_payload_lists_visible_tracks() {
        let config = TimelineConfig::default();
        let tracks = vec![track("a", 1, "1:00"), track("b", 2, "0:10"), track("c", 3, "0:30")];
        let layout = build_layout(&tracks, 1.0, &LaneAssignment::RoundRobin, &config, |_| None);
        let viewport = TimelineViewport {
            width: 200.0,
            height: 300.0,
            scroll_left: 500.0,
            scroll_top: 10.0,
            pixel_ratio: 2.0,
        };
        let payload = build_render_payload(&layout, &viewport, 5, RenderFlags::default(), &config);

        // a spans 0..480, c follows it in lane 0 at 480..720, b ends at 80
        let ids: Vec<&str> = payload.tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
        let c = &payload.tracks[0];
        assert_eq!(c.start_x, 480.0);
        assert_eq!(c.track_y, 12.0 - 10.0);
        assert_eq!(payload.buffer_id, "z:1000");
        assert_eq!(payload.render_version, 5);
        assert_eq!(payload.pixel_ratio, 2.0);
        assert_eq!(payload.total_width, 720.0);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["renderPxPerSec"], 8.0);
        assert_eq!(json["tracks"][0]["laneIndex"], 0);
    }
}
