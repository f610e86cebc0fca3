//! Overview strip and progress metrics

use serde::Serialize;

/// Viewport indicator on the overview strip, in overview pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OverviewViewport {
    pub left: f64,
    pub width: f64,
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Position of the viewport indicator on an overview strip
///
/// The overview shows `scroll_width` timeline pixels in `overview_width`
/// pixels. An empty overview or viewport yields a zero indicator.
pub fn overview_viewport(
    viewport_width: f64,
    overview_width: f64,
    scroll_width: f64,
    scroll_left: f64,
) -> OverviewViewport {
    let viewport_width = finite_or_zero(viewport_width).max(0.0);
    let overview_width = finite_or_zero(overview_width).max(0.0);
    if viewport_width == 0.0 || overview_width == 0.0 {
        return OverviewViewport::default();
    }
    let scroll_width = {
        let w = finite_or_zero(scroll_width);
        (if w > 0.0 { w } else { viewport_width }).max(1.0)
    };

    let ratio = overview_width / scroll_width;
    let width = overview_width.min(viewport_width * ratio);
    let max_left = (overview_width - width).max(0.0);
    let max_scroll = (scroll_width - viewport_width).max(0.0);
    let left = if max_scroll > 0.0 {
        max_left * (finite_or_zero(scroll_left) / max_scroll).clamp(0.0, 1.0)
    } else {
        0.0
    };
    OverviewViewport { left, width }
}

/// Scale from timeline pixels to overview pixels
pub fn overview_scale(overview_width: f64, total_width: f64) -> f64 {
    if overview_width > 0.0 && total_width > 0.0 && total_width.is_finite() {
        overview_width / total_width
    } else {
        0.0
    }
}

/// Pre-render progress as a whole percentage
pub fn pre_render_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overview_indicator() {
        let v = overview_viewport(500.0, 200.0, 2000.0, 750.0);
        assert_eq!(v.width, 50.0);
        assert_eq!(v.left, 75.0);
        // scrolled past the end clamps to the right edge
        assert_eq!(overview_viewport(500.0, 200.0, 2000.0, 9000.0).left, 150.0);
        // content narrower than the viewport fills the strip
        assert_eq!(overview_viewport(500.0, 200.0, 300.0, 0.0), OverviewViewport { left: 0.0, width: 200.0 });
        assert_eq!(overview_viewport(0.0, 200.0, 300.0, 0.0), OverviewViewport::default());
        assert_eq!(overview_viewport(500.0, 200.0, 0.0, 0.0).width, 200.0);
    }

    #[test]
    fn test_percent() {
        assert_eq!(pre_render_percent(0, 0), 0);
        assert_eq!(pre_render_percent(1, 3), 33);
        assert_eq!(pre_render_percent(2, 3), 67);
        assert_eq!(pre_render_percent(5, 3), 100);
        assert_eq!(overview_scale(200.0, 2000.0), 0.1);
        assert_eq!(overview_scale(200.0, 0.0), 0.0);
    }
}
