//! Timeline layout
//!
//! Places each track on a lane at a horizontal offset for one zoom. The
//! resulting [`TimelineLayout`] is an immutable snapshot; scroll queries run
//! against it without touching the track list again.

use std::collections::HashMap;

use mixtape_core::config::TimelineConfig;
use mixtape_core::MixtapeTrack;

use crate::zoom::render_px_per_sec;

/// How tracks are distributed over lanes
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LaneAssignment {
    /// Position in `mix_order` order modulo the lane count
    #[default]
    RoundRobin,
    /// Lane per track id; unknown ids fall back to round-robin
    Explicit(HashMap<String, usize>),
}

impl LaneAssignment {
    /// Lane for the track at `order_index` (out-of-range lanes wrap)
    pub fn lane_for(&self, track: &MixtapeTrack, order_index: usize, lane_count: usize) -> usize {
        let lane_count = lane_count.max(1);
        match self {
            LaneAssignment::RoundRobin => order_index % lane_count,
            LaneAssignment::Explicit(lanes) => lanes
                .get(&track.id)
                .map_or(order_index % lane_count, |lane| lane % lane_count),
        }
    }
}

/// One placed track
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineTrackLayout {
    pub track: MixtapeTrack,
    pub lane_index: usize,
    /// Left edge in timeline pixels
    pub start_x: f64,
    /// Width in pixels at the layout's zoom
    pub width: f64,
    /// Left edge in seconds
    pub start_sec: f64,
    /// Duration the width was computed from (0 when unknown)
    pub duration_seconds: f64,
}

impl TimelineTrackLayout {
    pub fn end_x(&self) -> f64 {
        self.start_x + self.width
    }

    /// Whether `[start, end]` touches the track
    pub fn intersects(&self, start: f64, end: f64) -> bool {
        self.end_x() >= start && self.start_x <= end
    }
}

/// Layout snapshot for one zoom
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineLayout {
    /// Sorted by `start_x`
    pub items: Vec<TimelineTrackLayout>,
    pub total_width: f64,
    /// `items[i].start_x`
    pub start_offsets: Vec<f64>,
    /// Running max of `items[..=i].end_x()`
    pub end_offsets: Vec<f64>,
    /// Zoom the layout was built at
    pub zoom: f64,
    pub px_per_sec: f64,
}

impl TimelineLayout {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Index of the first item that may intersect `[start, ..)`
    pub fn first_visible_index(&self, start: f64) -> usize {
        self.end_offsets.partition_point(|end| *end < start)
    }

    /// Items intersecting `[start, end]` in `start_x` order
    pub fn visible_items(&self, start: f64, end: f64) -> impl Iterator<Item = &TimelineTrackLayout> {
        let first = self.first_visible_index(start);
        self.items[first..]
            .iter()
            .take_while(move |item| item.start_x <= end)
            .filter(move |item| item.intersects(start, end))
    }

    pub fn find(&self, track_id: &str) -> Option<&TimelineTrackLayout> {
        self.items.iter().find(|item| item.track.id == track_id)
    }
}

/// Width of a track in pixels
///
/// `max(min_track_width, round(duration × px_per_sec))`, or the fallback width
/// when the duration is unknown.
pub fn track_width(duration_seconds: f64, px_per_sec: f64, config: &TimelineConfig) -> f64 {
    if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
        return config.fallback_track_width;
    }
    config.min_track_width.max((duration_seconds * px_per_sec).round())
}

/// Lay out tracks at `zoom`
///
/// Tracks are taken in `mix_order` order. `decoded_duration` supplies the
/// duration of a track's decoded waveform; when it is missing or not
/// positive the display duration is parsed instead. A track's `start_sec`,
/// when set, pins its left edge; otherwise it follows the previous track in
/// its lane.
pub fn build_layout<F>(
    tracks: &[MixtapeTrack],
    zoom: f64,
    lanes: &LaneAssignment,
    config: &TimelineConfig,
    decoded_duration: F,
) -> TimelineLayout
where
    F: Fn(&MixtapeTrack) -> Option<f64>,
{
    let px_per_sec = render_px_per_sec(zoom, config);
    let lane_count = config.lane_count.max(1);

    let mut ordered: Vec<&MixtapeTrack> = tracks.iter().collect();
    ordered.sort_by_key(|track| track.mix_order);

    let mut lane_cursor = vec![0.0f64; lane_count];
    let mut items = Vec::with_capacity(ordered.len());
    for (order_index, track) in ordered.into_iter().enumerate() {
        let lane_index = lanes.lane_for(track, order_index, lane_count);
        let duration_seconds = decoded_duration(track)
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or_else(|| track.duration_seconds());
        let width = track_width(duration_seconds, px_per_sec, config);

        let cursor = &mut lane_cursor[lane_index];
        let start_x = match track.start_sec.filter(|s| s.is_finite() && *s >= 0.0) {
            Some(sec) => (sec * px_per_sec).round(),
            None => *cursor,
        };
        *cursor = cursor.max(start_x + width + config.track_gap_px);

        items.push(TimelineTrackLayout {
            track: track.clone(),
            lane_index,
            start_x,
            width,
            start_sec: if px_per_sec > 0.0 { start_x / px_per_sec } else { 0.0 },
            duration_seconds: duration_seconds.max(0.0),
        });
    }

    // stable: same-offset tracks keep lane placement order
    items.sort_by(|a, b| a.start_x.total_cmp(&b.start_x));

    let start_offsets: Vec<f64> = items.iter().map(|item| item.start_x).collect();
    let mut end_offsets = Vec::with_capacity(items.len());
    let mut running_end = 0.0f64;
    for item in &items {
        running_end = running_end.max(item.end_x());
        end_offsets.push(running_end);
    }

    log::debug!(
        "build_layout: {} tracks, zoom {:.3}, total width {}",
        items.len(),
        zoom,
        running_end
    );

    TimelineLayout {
        items,
        total_width: running_end,
        start_offsets,
        end_offsets,
        zoom,
        px_per_sec,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn track(id: &str, mix_order: i64, duration: &str) -> MixtapeTrack {
        MixtapeTrack {
            id: id.to_string(),
            mix_order,
            title: id.to_string(),
            artist: String::new(),
            duration: duration.to_string(),
            file_path: format!("/music/{id}.wav"),
            origin_path: format!("/music/{id}.wav"),
            origin_playlist_uuid: None,
            bpm: Some(120.0),
            first_beat_ms: Some(0.0),
            bar_beat_offset: 0,
            start_sec: None,
            info_json: None,
        }
    }

    fn layout_of(tracks: &[MixtapeTrack], zoom: f64) -> TimelineLayout {
        build_layout(tracks, zoom, &LaneAssignment::RoundRobin, &TimelineConfig::default(), |_| None)
    }

    #[test]
    fn test_two_tracks_two_lanes() {
        let tracks = vec![track("a", 1, "0:30"), track("b", 2, "1:00")];
        let layout = layout_of(&tracks, 1.0);
        assert_eq!(layout.px_per_sec, 8.0);

        let a = layout.find("a").unwrap();
        assert_eq!((a.lane_index, a.start_x, a.width), (0, 0.0, 240.0));
        let b = layout.find("b").unwrap();
        assert_eq!((b.lane_index, b.start_x, b.width), (1, 0.0, 480.0));
        assert_eq!(layout.total_width, 480.0);
    }

    #[test]
    fn test_same_lane_tracks_follow_each_other() {
        let tracks = vec![
            track("a", 1, "0:10"),
            track("b", 2, "0:20"),
            track("c", 3, "0:05"),
        ];
        let layout = layout_of(&tracks, 1.0);
        let c = layout.find("c").unwrap();
        assert_eq!((c.lane_index, c.start_x), (0, 80.0));
        assert!((c.start_sec - 10.0).abs() < 1e-9);
        assert_eq!(layout.start_offsets, vec![0.0, 0.0, 80.0]);
        assert_eq!(layout.end_offsets, vec![80.0, 160.0, 160.0]);
    }

    #[test]
    fn test_decoded_duration_and_fallback_width() {
        let tracks = vec![track("a", 1, "0:30"), track("b", 2, "")];
        let config = TimelineConfig::default();
        let layout = build_layout(&tracks, 1.0, &LaneAssignment::RoundRobin, &config, |t| {
            (t.id == "a").then_some(45.0)
        });
        assert_eq!(layout.find("a").unwrap().width, 360.0);
        assert_eq!(layout.find("b").unwrap().width, config.fallback_track_width);
        // very short track at minimum zoom
        let short = vec![track("s", 1, "0.2")];
        assert_eq!(layout_of(&short, 0.1).items[0].width, config.min_track_width);
    }

    #[test]
    fn test_explicit_lanes_and_start_sec() {
        let mut tracks = vec![track("a", 1, "0:10"), track("b", 2, "0:10"), track("c", 3, "0:10")];
        tracks[2].start_sec = Some(100.0);
        let lanes = LaneAssignment::Explicit(HashMap::from([
            ("a".to_string(), 1),
            ("b".to_string(), 3),
        ]));
        let layout = build_layout(&tracks, 1.0, &lanes, &TimelineConfig::default(), |_| None);
        let a = layout.find("a").unwrap();
        let b = layout.find("b").unwrap();
        let c = layout.find("c").unwrap();
        assert_eq!((a.lane_index, a.start_x), (1, 0.0));
        // lane 3 wraps to lane 1, right after a
        assert_eq!((b.lane_index, b.start_x), (1, 80.0));
        assert_eq!((c.lane_index, c.start_x), (0, 800.0));
        assert_eq!(layout.items.last().map(|i| i.track.id.as_str()), Some("c"));
    }

    #[test]
    fn test_visible_items_binary_search() {
        let tracks: Vec<MixtapeTrack> = (0..20)
            .map(|i| track(&format!("t{i}"), i + 1, "0:10"))
            .collect();
        let layout = layout_of(&tracks, 1.0);
        // lanes 0/1 both hold ten 80px tracks
        assert_eq!(layout.total_width, 800.0);
        let visible: Vec<&str> = layout
            .visible_items(170.0, 230.0)
            .map(|item| item.track.id.as_str())
            .collect();
        assert_eq!(visible, vec!["t4", "t5"]);
        assert_eq!(layout.first_visible_index(170.0), 4);
        assert_eq!(layout.visible_items(900.0, 1000.0).count(), 0);
        assert!(layout_of(&[], 1.0).is_empty());
    }
}
