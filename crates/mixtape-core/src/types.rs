//! Common types for the mixtape
//!
//! This module contains the track model shared by every other part of the
//! mixtape core, plus the persisted/IPC record it is derived from.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tolerance used for every time comparison in the mixtape (seconds)
pub const TIME_EPSILON: f64 = 0.0001;

/// Number of beats in one bar-grid period on the timeline
pub const BEATS_PER_BAR_GRID: u32 = 32;

/// Round to a fixed number of decimal places
///
/// Matches the persisted representation of times (4 places) and gains (6 places).
#[inline]
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

// ============================================================================
// Persisted record
// ============================================================================

/// On-disk / IPC record for one mixtape entry
///
/// Every field is optional because the record may come from older databases.
/// `info_json` is an opaque per-track payload that is carried through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixtapeRawItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mix_order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_playlist_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_path_snapshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_json: Option<String>,
}

// ============================================================================
// Track
// ============================================================================

/// One track placed on the mixtape timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixtapeTrack {
    /// Stable identifier
    pub id: String,
    /// Lane placement order (not necessarily contiguous)
    pub mix_order: i64,
    pub title: String,
    pub artist: String,
    /// Display duration ("m:ss", "h:mm:ss" or plain seconds)
    pub duration: String,
    /// Current on-disk location
    pub file_path: String,
    /// Source-of-truth path used to detect moved/renamed files
    pub origin_path: String,
    /// Playlist the track was added from
    #[serde(default)]
    pub origin_playlist_uuid: Option<String>,
    #[serde(default)]
    pub bpm: Option<f64>,
    /// First beat offset in the source file (milliseconds)
    #[serde(default)]
    pub first_beat_ms: Option<f64>,
    /// Bar-grid phase in beats (0-31)
    #[serde(default)]
    pub bar_beat_offset: u32,
    /// Explicit timeline start (seconds), when the user placed the track
    #[serde(default)]
    pub start_sec: Option<f64>,
    /// Opaque payload from the persisted record, written back unchanged
    #[serde(default)]
    pub info_json: Option<String>,
}

impl MixtapeTrack {
    /// Derive a track from its persisted record
    ///
    /// `index` is the record's position in the response and is used for
    /// fallback ids and ordering. Display fields are read from `info_json`
    /// when it parses as a JSON object; a malformed payload is kept verbatim
    /// but contributes nothing.
    pub fn from_raw_item(raw: &MixtapeRawItem, index: usize, unknown_label: &str) -> Self {
        let info = raw
            .info_json
            .as_deref()
            .and_then(|text| serde_json::from_str::<Value>(text).ok())
            .filter(Value::is_object);
        let info_str = |key: &str| {
            info.as_ref()
                .and_then(|v| v.get(key))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let info_f64 = |key: &str| info.as_ref().and_then(|v| v.get(key)).and_then(Value::as_f64);

        let file_path = raw
            .file_path
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| info_str("filePath"))
            .unwrap_or_default();
        let file_name = file_name_of(&file_path);

        let title = info_str("title")
            .or_else(|| (!file_name.is_empty()).then(|| file_name.to_string()))
            .unwrap_or_else(|| unknown_label.to_string());

        let mix_order = raw
            .mix_order
            .filter(|order| *order != 0)
            .unwrap_or(index as i64 + 1);

        Self {
            id: raw
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("{}-{}", file_path, index)),
            mix_order,
            title,
            artist: info_str("artist").unwrap_or_default(),
            duration: info_str("duration").unwrap_or_default(),
            origin_path: raw.origin_path_snapshot.clone().unwrap_or_default(),
            origin_playlist_uuid: raw.origin_playlist_uuid.clone().filter(|s| !s.is_empty()),
            bpm: normalize_bpm(info_f64("bpm")),
            first_beat_ms: info_f64("firstBeatMs").filter(|ms| ms.is_finite() && *ms >= 0.0),
            bar_beat_offset: normalize_bar_beat_offset(info_f64("barBeatOffset")),
            start_sec: info_f64("startSec")
                .filter(|sec| sec.is_finite() && *sec >= 0.0)
                .map(|sec| round_to(sec, 4)),
            info_json: raw.info_json.clone(),
            file_path,
        }
    }

    /// Write the track back into its persisted record shape
    pub fn to_raw_item(&self) -> MixtapeRawItem {
        MixtapeRawItem {
            id: Some(self.id.clone()),
            file_path: Some(self.file_path.clone()),
            mix_order: Some(self.mix_order),
            origin_playlist_uuid: self.origin_playlist_uuid.clone(),
            origin_path_snapshot: (!self.origin_path.is_empty()).then(|| self.origin_path.clone()),
            info_json: self.info_json.clone(),
        }
    }

    /// Point the track at a new on-disk location after the file moved
    pub fn repoint(&mut self, new_path: &str) {
        log::info!("repoint: {} -> {}", self.file_path, new_path);
        self.file_path = new_path.trim().to_string();
    }

    /// Display title, falling back to the file name
    pub fn display_title(&self) -> &str {
        let title = self.title.trim();
        if !title.is_empty() {
            return title;
        }
        file_name_of(&self.file_path)
    }

    /// Display duration parsed to seconds (0 when unknown)
    pub fn duration_seconds(&self) -> f64 {
        parse_duration_to_seconds(&self.duration)
    }
}

/// Sort tracks by lane placement order, keeping input order for ties
pub fn sort_by_mix_order(tracks: &mut [MixtapeTrack]) {
    tracks.sort_by_key(|track| track.mix_order);
}

// ============================================================================
// Parsing helpers
// ============================================================================

/// Last path segment, accepting both `/` and `\` separators
pub fn file_name_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Parse a display duration ("s", "m:ss" or "h:mm:ss") into seconds
///
/// Non-numeric parts are skipped; an empty or unparseable string is 0.
pub fn parse_duration_to_seconds(input: &str) -> f64 {
    let parts: Vec<f64> = input
        .trim()
        .split(':')
        .filter_map(|part| part.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .collect();
    let seconds = match parts.as_slice() {
        [] => 0.0,
        [s] => *s,
        [m, s] => m * 60.0 + s,
        [h, m, s, ..] => h * 3600.0 + m * 60.0 + s,
    };
    seconds.max(0.0)
}

/// Valid BPM rounded to 2 places, or `None`
pub fn normalize_bpm(value: Option<f64>) -> Option<f64> {
    value
        .filter(|bpm| bpm.is_finite() && *bpm > 0.0)
        .map(|bpm| round_to(bpm, 2))
}

/// Wrap a bar phase into 0..32
pub fn normalize_bar_beat_offset(value: Option<f64>) -> u32 {
    match value {
        Some(v) if v.is_finite() => {
            let period = BEATS_PER_BAR_GRID as i64;
            ((v.round() as i64 % period + period) % period) as u32
        }
        _ => 0,
    }
}

/// Trim, drop empties and deduplicate paths, keeping first-seen order
pub fn normalize_unique_paths<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .iter()
        .map(|value| value.as_ref().trim())
        .filter(|value| !value.is_empty())
        .filter(|value| seen.insert(value.to_string()))
        .map(str::to_string)
        .collect()
}
