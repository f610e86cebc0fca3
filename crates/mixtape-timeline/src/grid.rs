//! Beat grid geometry
//!
//! Grid lines are derived from a track's tempo and first-beat offset. At low
//! zoom only bar lines are kept so the grid never turns into a solid fill.

use serde::Serialize;

use mixtape_core::config::TimelineConfig;
use mixtape_core::BEATS_PER_BAR_GRID;

use crate::tiles::PixelRange;

const BEATS_PER_GROUP: i64 = 4;

/// Lines beyond this count are not emitted for a single range
const MAX_GRID_LINES: i64 = 100_000;

/// Which line levels are drawn at a zoom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GridDensity {
    BarOnly,
    Beat4,
    Beat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GridLevel {
    /// Every 32nd beat, shifted by the track's bar-beat offset
    Bar,
    /// Every 4th beat
    Beat4,
    Beat,
}

impl GridDensity {
    pub fn shows(&self, level: GridLevel) -> bool {
        match (self, level) {
            (_, GridLevel::Bar) => true,
            (GridDensity::BarOnly, _) => false,
            (GridDensity::Beat4, GridLevel::Beat4) => true,
            (GridDensity::Beat4, GridLevel::Beat) => false,
            (GridDensity::Beat, _) => true,
        }
    }
}

/// One grid line in track-local pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridLine {
    pub x: f64,
    pub level: GridLevel,
}

pub fn grid_density(zoom: f64, config: &TimelineConfig) -> GridDensity {
    if zoom <= config.grid_bar_only_zoom || zoom < config.grid_beat4_zoom {
        GridDensity::BarOnly
    } else if zoom < config.grid_beat_zoom {
        GridDensity::Beat4
    } else {
        GridDensity::Beat
    }
}

fn level_of(beat_index: i64, bar_beat_offset: u32) -> GridLevel {
    let shifted = beat_index - i64::from(bar_beat_offset);
    if shifted.rem_euclid(i64::from(BEATS_PER_BAR_GRID)) == 0 {
        GridLevel::Bar
    } else if shifted.rem_euclid(BEATS_PER_GROUP) == 0 {
        GridLevel::Beat4
    } else {
        GridLevel::Beat
    }
}

/// Grid lines of one track inside a track-local pixel range
///
/// Lines up to one beat outside the range are included so strokes at the
/// edges are not clipped. Returns nothing without a usable tempo.
pub fn grid_lines(
    bpm: Option<f64>,
    first_beat_ms: Option<f64>,
    bar_beat_offset: u32,
    range: PixelRange,
    px_per_sec: f64,
    zoom: f64,
    config: &TimelineConfig,
) -> Vec<GridLine> {
    let Some(bpm) = bpm.filter(|b| b.is_finite() && *b > 0.0) else {
        return Vec::new();
    };
    if !px_per_sec.is_finite() || px_per_sec <= 0.0 || range.is_empty() {
        return Vec::new();
    }
    let interval = 60.0 / bpm * px_per_sec;
    if !interval.is_finite() || interval <= 0.0 {
        return Vec::new();
    }
    let offset = first_beat_ms.filter(|ms| ms.is_finite()).unwrap_or(0.0) / 1000.0 * px_per_sec;

    let first = ((range.start - offset) / interval).floor() as i64 - 2;
    let last = ((range.end - offset) / interval).ceil() as i64 + 2;
    if last - first > MAX_GRID_LINES {
        log::debug!("grid_lines: {} lines requested, skipping", last - first);
        return Vec::new();
    }

    let density = grid_density(zoom, config);
    (first..=last)
        .filter_map(|index| {
            let x = offset + index as f64 * interval;
            if x < range.start - interval || x > range.end + interval {
                return None;
            }
            let level = level_of(index, bar_beat_offset);
            density.shows(level).then_some(GridLine { x, level })
        })
        .collect()
}

/// Bar line stroke width, widening from minimum zoom up to the max-width zoom
pub fn grid_bar_width(zoom: f64, config: &TimelineConfig) -> f64 {
    let (lo, hi) = (config.zoom_min, config.grid_bar_width_max_zoom);
    if zoom <= lo || hi <= lo {
        return config.grid_bar_width_min;
    }
    if zoom >= hi {
        return config.grid_bar_width_max;
    }
    let t = (zoom - lo) / (hi - lo);
    config.grid_bar_width_min + (config.grid_bar_width_max - config.grid_bar_width_min) * t
}
