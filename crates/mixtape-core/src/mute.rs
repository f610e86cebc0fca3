//! Volume mute segments
//!
//! A track's mute regions are kept in one canonical form: sorted by start,
//! non-overlapping, every width above `TIME_EPSILON`, bounds rounded to 4
//! decimals. Every edit goes back through [`normalize_segments`], so the
//! canonical form is an invariant of the stored list rather than an input
//! assumption.

use serde::{Deserialize, Serialize};

use crate::types::{round_to, TIME_EPSILON};

/// One muted time range `[start_sec, end_sec)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuteSegment {
    pub start_sec: f64,
    pub end_sec: f64,
}

impl MuteSegment {
    pub fn new(start_sec: f64, end_sec: f64) -> Self {
        Self { start_sec, end_sec }
    }

    pub fn width(&self) -> f64 {
        self.end_sec - self.start_sec
    }
}

/// Unvalidated segment as it arrives from a gesture or a persisted record
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMuteSegment {
    pub start_sec: Option<f64>,
    pub end_sec: Option<f64>,
}

impl From<MuteSegment> for RawMuteSegment {
    fn from(segment: MuteSegment) -> Self {
        Self {
            start_sec: Some(segment.start_sec),
            end_sec: Some(segment.end_sec),
        }
    }
}

impl From<(f64, f64)> for RawMuteSegment {
    fn from((start, end): (f64, f64)) -> Self {
        Self {
            start_sec: Some(start),
            end_sec: Some(end),
        }
    }
}

/// Read segments leniently from a JSON value (e.g. a track's `infoJson`)
///
/// Anything that is not an array yields nothing; entries whose bounds are not
/// numbers come through as `None` and are dropped by normalization.
pub fn raw_segments_from_json(value: &serde_json::Value) -> Vec<RawMuteSegment> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| RawMuteSegment {
                    start_sec: item.get("startSec").and_then(serde_json::Value::as_f64),
                    end_sec: item.get("endSec").and_then(serde_json::Value::as_f64),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn duration_limit(duration: Option<f64>) -> f64 {
    match duration {
        Some(d) if d.is_finite() => d.max(0.0),
        _ => f64::INFINITY,
    }
}

fn clamp_segment(raw: RawMuteSegment, limit: f64) -> Option<MuteSegment> {
    let (start, end) = (raw.start_sec?, raw.end_sec?);
    if !start.is_finite() || !end.is_finite() {
        return None;
    }
    let start = start.max(0.0);
    let end = end.min(limit);
    if end - start <= TIME_EPSILON {
        return None;
    }
    let segment = MuteSegment::new(round_to(start, 4), round_to(end, 4));
    // rounding can collapse a width that was just above epsilon
    (segment.width() > TIME_EPSILON).then_some(segment)
}

/// Canonicalize a list of mute edits
///
/// Bounds are clamped to `[0, duration]` (unbounded above when the duration is
/// unknown or non-finite). Malformed and near-zero-width entries are dropped.
/// After sorting by `(start, end)`, duplicates, overlapping and touching
/// segments are folded together: two segments merge when the second starts
/// no later than `TIME_EPSILON` after the first ends. Muting two adjacent
/// cells therefore stores one segment, and unmuting one of them splits it
/// back.
pub fn normalize_segments<I>(raw: I, duration: Option<f64>) -> Vec<MuteSegment>
where
    I: IntoIterator,
    I::Item: Into<RawMuteSegment>,
{
    let limit = duration_limit(duration);
    let mut segments: Vec<MuteSegment> = raw
        .into_iter()
        .filter_map(|item| clamp_segment(item.into(), limit))
        .collect();
    segments.sort_by(|a, b| {
        a.start_sec
            .total_cmp(&b.start_sec)
            .then(a.end_sec.total_cmp(&b.end_sec))
    });

    let mut merged: Vec<MuteSegment> = Vec::with_capacity(segments.len());
    for segment in segments {
        match merged.last_mut() {
            Some(last) if segment.start_sec <= last.end_sec + TIME_EPSILON => {
                last.end_sec = last.end_sec.max(segment.end_sec);
            }
            _ => merged.push(segment),
        }
    }
    merged
}

/// Re-normalize an already stored list (e.g. after the duration changed)
pub fn normalize_mute_segments(segments: &[MuteSegment], duration: Option<f64>) -> Vec<MuteSegment> {
    normalize_segments(segments.iter().copied(), duration)
}

/// Whether `sec` falls inside a segment (end exclusive)
///
/// Expects the canonical sorted list; stops at the first segment that starts
/// after `sec`.
pub fn is_muted_at(segments: &[MuteSegment], sec: f64) -> bool {
    if !sec.is_finite() || sec < 0.0 {
        return false;
    }
    for segment in segments {
        if sec < segment.start_sec - TIME_EPSILON {
            return false;
        }
        if sec < segment.end_sec - TIME_EPSILON {
            return true;
        }
    }
    false
}

fn valid_range(start: f64, end: f64) -> bool {
    start.is_finite() && end.is_finite() && end - start > TIME_EPSILON
}

/// Mute `[start, end)` in addition to the existing segments
pub fn add_mute_range(
    segments: &[MuteSegment],
    start: f64,
    end: f64,
    duration: Option<f64>,
) -> Vec<MuteSegment> {
    if !valid_range(start, end) {
        log::trace!("add_mute_range: ignoring range {}..{}", start, end);
        return normalize_mute_segments(segments, duration);
    }
    let raw = segments
        .iter()
        .copied()
        .map(RawMuteSegment::from)
        .chain(std::iter::once(RawMuteSegment::from((start, end))));
    normalize_segments(raw, duration)
}

/// Unmute `[start, end)`, splitting segments that straddle the range
pub fn remove_mute_range(
    segments: &[MuteSegment],
    start: f64,
    end: f64,
    duration: Option<f64>,
) -> Vec<MuteSegment> {
    if !valid_range(start, end) {
        log::trace!("remove_mute_range: ignoring range {}..{}", start, end);
        return normalize_mute_segments(segments, duration);
    }
    let mut remaining = Vec::with_capacity(segments.len() + 1);
    for segment in segments {
        if segment.end_sec <= start || segment.start_sec >= end {
            remaining.push(*segment);
            continue;
        }
        if segment.start_sec < start {
            remaining.push(MuteSegment::new(segment.start_sec, start));
        }
        if segment.end_sec > end {
            remaining.push(MuteSegment::new(end, segment.end_sec));
        }
    }
    normalize_mute_segments(&remaining, duration)
}

/// Toggle the cell `[start, end)`: unmute it if its midpoint is muted, mute it otherwise
pub fn toggle_mute_at(
    segments: &[MuteSegment],
    start: f64,
    end: f64,
    duration: Option<f64>,
) -> Vec<MuteSegment> {
    if !valid_range(start, end) {
        return normalize_mute_segments(segments, duration);
    }
    if is_muted_at(segments, (start + end) / 2.0) {
        remove_mute_range(segments, start, end, duration)
    } else {
        add_mute_range(segments, start, end, duration)
    }
}

/// Total muted time in seconds
pub fn total_muted_seconds(segments: &[MuteSegment]) -> f64 {
    segments.iter().map(MuteSegment::width).sum()
}
