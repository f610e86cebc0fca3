//! Zoom math
//!
//! The user zoom is continuous; tiles and layouts are built at a discrete
//! render zoom so that small zoom gestures reuse the same geometry.

use mixtape_core::config::TimelineConfig;

const LEVEL_EPSILON: f64 = 0.0001;

/// Clamp into `[zoom_min, zoom_max]`; non-finite input counts as 1
pub fn clamp_zoom(zoom: f64, config: &TimelineConfig) -> f64 {
    let zoom = if zoom.is_finite() { zoom } else { 1.0 };
    zoom.clamp(config.zoom_min, config.zoom_max.max(config.zoom_min))
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Ascending list of render zoom levels
///
/// The minimum, a half step above it, every full step above the minimum,
/// and the maximum. With the defaults: 0.1, 0.2, 0.3, 0.5, ... 2.9, 3.0.
pub fn render_zoom_levels(config: &TimelineConfig) -> Vec<f64> {
    let (min, max) = (config.zoom_min, config.zoom_max.max(config.zoom_min));
    let step = config.render_zoom_step;
    let mut levels: Vec<f64> = Vec::new();
    let mut push = |value: f64| {
        if value < min - LEVEL_EPSILON || value > max + LEVEL_EPSILON {
            return;
        }
        let rounded = round3(value);
        if !levels.iter().any(|level| (level - rounded).abs() < LEVEL_EPSILON) {
            levels.push(rounded);
        }
    };

    push(min);
    if step > 0.0 && step.is_finite() {
        let half = min + step / 2.0;
        if half < min + step - LEVEL_EPSILON {
            push(half);
        }
        let mut k = 1.0;
        while min + step * k <= max + LEVEL_EPSILON {
            push(min + step * k);
            k += 1.0;
        }
    }
    push(max);
    levels.sort_by(f64::total_cmp);
    levels
}

/// Nearest render zoom level (ties go to the lower level)
pub fn quantize_render_zoom(zoom: f64, config: &TimelineConfig) -> f64 {
    let clamped = clamp_zoom(zoom, config);
    let mut nearest: Option<(f64, f64)> = None;
    for level in render_zoom_levels(config) {
        let diff = (clamped - level).abs();
        if nearest.map_or(true, |(_, best)| diff < best) {
            nearest = Some((level, diff));
        }
    }
    nearest.map_or(clamped, |(level, _)| clamp_zoom(level, config))
}

/// Horizontal pixels per second of audio at a zoom
pub fn render_px_per_sec(zoom: f64, config: &TimelineConfig) -> f64 {
    config.base_px_per_sec * config.width_scale * clamp_zoom(zoom, config)
}

/// Integer identity of a zoom value (thousandths)
pub fn zoom_bucket(zoom: f64) -> i64 {
    (zoom * 1000.0).round() as i64
}

/// Renderer buffer id for a zoom
pub fn buffer_id(zoom: f64) -> String {
    format!("z:{}", zoom_bucket(zoom))
}
