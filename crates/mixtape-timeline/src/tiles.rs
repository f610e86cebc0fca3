//! Waveform tiles and the pre-render plan
//!
//! A track's waveform is drawn in fixed-width slices so that scrolling only
//! renders the slices entering view. Pixel ranges here are timeline pixels
//! unless stated as track-local.

use serde::Serialize;

use mixtape_core::config::TimelineConfig;

use crate::layout::{TimelineLayout, TimelineTrackLayout};
use crate::zoom::zoom_bucket;

/// One horizontal slice of a track, in track-local pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WaveformTile {
    pub index: u32,
    pub start: f64,
    pub width: f64,
}

impl WaveformTile {
    pub fn end(&self) -> f64 {
        self.start + self.width
    }
}

/// Half-open pixel range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelRange {
    pub start: f64,
    pub end: f64,
}

impl PixelRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn width(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        !(self.end > self.start)
    }

    /// Same range shifted into a coordinate system starting at `origin`
    pub fn relative_to(&self, origin: f64) -> Self {
        Self::new(self.start - origin, self.end - origin)
    }
}

fn tile_count(track_width: f64, tile_width: u32) -> u32 {
    if !track_width.is_finite() || track_width <= 0.0 || tile_width == 0 {
        return 0;
    }
    (track_width / f64::from(tile_width)).ceil().max(1.0) as u32
}

/// Tile `index` of a track, `None` past the last tile
pub fn tile_at(track_width: f64, tile_width: u32, index: u32) -> Option<WaveformTile> {
    if index >= tile_count(track_width, tile_width) {
        return None;
    }
    let start = f64::from(index) * f64::from(tile_width);
    let width = f64::from(tile_width).min(track_width - start);
    (width > 0.0).then_some(WaveformTile { index, start, width })
}

/// All tiles of a track; the last one may be narrower
pub fn tiles_for_width(track_width: f64, tile_width: u32) -> Vec<WaveformTile> {
    (0..tile_count(track_width, tile_width))
        .filter_map(|index| tile_at(track_width, tile_width, index))
        .collect()
}

/// Tiles overlapping the track-local range
pub fn tiles_in_range(track_width: f64, tile_width: u32, local: PixelRange) -> Vec<WaveformTile> {
    let count = tile_count(track_width, tile_width);
    let start = local.start.max(0.0);
    let end = local.end.min(track_width);
    if count == 0 || !(end > start) {
        return Vec::new();
    }
    let tile = f64::from(tile_width);
    let first = (start / tile).floor() as u32;
    let last = ((end / tile).ceil() as u32).saturating_sub(1).max(first).min(count - 1);
    (first..=last)
        .filter_map(|index| tile_at(track_width, tile_width, index))
        .collect()
}

/// The viewport widened by `buffer` viewport widths on each side
pub fn pre_render_range(scroll_left: f64, viewport_width: f64, buffer: f64) -> PixelRange {
    let scroll_left = if scroll_left.is_finite() { scroll_left.max(0.0) } else { 0.0 };
    let viewport_width = if viewport_width.is_finite() { viewport_width.max(0.0) } else { 0.0 };
    let margin = viewport_width * buffer.max(0.0);
    PixelRange::new(
        (scroll_left - margin).max(0.0),
        scroll_left + viewport_width + margin,
    )
}

/// Identity of a rendered tile for one render generation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileKey {
    pub file_path: String,
    pub tile_index: u32,
    pub render_version: u64,
    pub zoom_bucket: i64,
}

/// One tile to render ahead of display
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveformPreRenderTask {
    pub key: TileKey,
    pub track_id: String,
    pub lane_index: usize,
    pub tile: WaveformTile,
    pub track_width: f64,
    pub duration_seconds: f64,
    /// Pyramid level the tile is drawn from
    pub level_factor: u32,
}

/// Tasks for every tile intersecting `range`
///
/// `level_for` picks the pyramid level of a track; tracks for which it
/// returns `None` (no waveform yet) are skipped.
pub fn plan_pre_render_tasks<F>(
    layout: &TimelineLayout,
    range: PixelRange,
    render_version: u64,
    config: &TimelineConfig,
    mut level_for: F,
) -> Vec<WaveformPreRenderTask>
where
    F: FnMut(&TimelineTrackLayout) -> Option<u32>,
{
    if range.is_empty() {
        return Vec::new();
    }
    let bucket = zoom_bucket(layout.zoom);
    let mut tasks = Vec::new();
    for item in layout.visible_items(range.start, range.end) {
        if item.track.file_path.is_empty() {
            continue;
        }
        let Some(level_factor) = level_for(item) else {
            continue;
        };
        let local = range.relative_to(item.start_x);
        for tile in tiles_in_range(item.width, config.tile_width, local) {
            tasks.push(WaveformPreRenderTask {
                key: TileKey {
                    file_path: item.track.file_path.clone(),
                    tile_index: tile.index,
                    render_version,
                    zoom_bucket: bucket,
                },
                track_id: item.track.id.clone(),
                lane_index: item.lane_index,
                tile,
                track_width: item.width,
                duration_seconds: item.duration_seconds,
                level_factor,
            });
        }
    }
    log::trace!(
        "plan_pre_render_tasks: {} tasks for {:.0}..{:.0}",
        tasks.len(),
        range.start,
        range.end
    );
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tests::track;
    use crate::layout::{build_layout, LaneAssignment};

    #[test]
    fn test_tiles_cover_width() {
        let tiles = tiles_for_width(2500.0, 1200);
        assert_eq!(tiles.len(), 3);
        assert_eq!(tiles[2], WaveformTile { index: 2, start: 2400.0, width: 100.0 });
        assert_eq!(tiles_for_width(1200.0, 1200).len(), 1);
        assert_eq!(tiles_for_width(5.0, 1200)[0].width, 5.0);
        assert!(tiles_for_width(0.0, 1200).is_empty());
        assert!(tiles_for_width(f64::NAN, 1200).is_empty());
        assert!(tile_at(2500.0, 1200, 3).is_none());
    }

    #[test]
    fn test_tiles_in_range() {
        let indices = |start: f64, end: f64| -> Vec<u32> {
            tiles_in_range(5000.0, 1200, PixelRange::new(start, end))
                .iter()
                .map(|t| t.index)
                .collect()
        };
        assert_eq!(indices(0.0, 1200.0), vec![0]);
        assert_eq!(indices(1199.0, 1201.0), vec![0, 1]);
        assert_eq!(indices(-500.0, 10.0), vec![0]);
        assert_eq!(indices(4700.0, 9000.0), vec![3, 4]);
        assert!(indices(6000.0, 7000.0).is_empty());
        assert!(indices(-900.0, -100.0).is_empty());
    }

    #[test]
    fn test_fractional_range_end_reaches_next_tile() {
        let indices = |start: f64, end: f64| -> Vec<u32> {
            tiles_in_range(5000.0, 1200, PixelRange::new(start, end))
                .iter()
                .map(|t| t.index)
                .collect()
        };
        assert_eq!(indices(0.0, 1200.5), vec![0, 1]);
        assert_eq!(indices(0.0, 1199.5), vec![0]);
        assert_eq!(indices(1200.0, 1200.25), vec![1]);
        // buffered range of a viewport scrolled to a fractional offset
        let range = pre_render_range(10.25, 500.0, 1.2).relative_to(3.5);
        assert_eq!(range.end, 1106.75);
        assert_eq!(tiles_in_range(5000.0, 1000, range).len(), 2);
    }

    #[test]
    fn test_pre_render_range() {
        assert_eq!(pre_render_range(1000.0, 500.0, 1.2), PixelRange::new(400.0, 2100.0));
        assert_eq!(pre_render_range(100.0, 500.0, 1.2), PixelRange::new(0.0, 1200.0));
        assert!(pre_render_range(0.0, 0.0, 1.2).is_empty());
    }

    #[test]
    fn test_plan_tasks() {
        let config = TimelineConfig::default();
        // 10 minutes at 8 px/s is 4800 px: four tiles
        let mut tracks = vec![track("a", 1, "10:00"), track("b", 2, "0:30"), track("c", 3, "0:30")];
        tracks[2].file_path.clear();
        let layout = build_layout(&tracks, 1.0, &LaneAssignment::RoundRobin, &config, |_| None);

        let tasks = plan_pre_render_tasks(&layout, PixelRange::new(0.0, 1300.0), 7, &config, |item| {
            (item.track.id == "a").then_some(4)
        });
        let keys: Vec<(String, u32)> = tasks.iter().map(|t| (t.track_id.clone(), t.tile.index)).collect();
        assert_eq!(keys, vec![("a".to_string(), 0), ("a".to_string(), 1)]);
        assert!(tasks.iter().all(|t| t.key.render_version == 7 && t.key.zoom_bucket == 1000));
        assert_eq!(tasks[0].level_factor, 4);
        assert_eq!(tasks[0].track_width, 4800.0);

        let all = plan_pre_render_tasks(&layout, PixelRange::new(0.0, 1300.0), 7, &config, |_| Some(1));
        // b has a file, c does not
        assert_eq!(all.len(), 3);
        assert!(plan_pre_render_tasks(&layout, PixelRange::new(5.0, 5.0), 7, &config, |_| Some(1)).is_empty());
    }
}
