//! Per-track gain automation envelopes
//!
//! Each `(track, EnvelopeParam)` pair owns a sorted list of [`GainPoint`]s
//! defining a piecewise-linear curve over the track's duration. A normalized
//! envelope always starts at 0 s and, when the duration is known, ends exactly
//! at the duration, so the first and last points are fixed boundaries.
//!
//! The point edit helpers are pure: they take the current sequence and
//! return the replacement. Storing the result and recording undo is the
//! session's job.

use serde::{Deserialize, Serialize};

use crate::types::{round_to, TIME_EPSILON};

/// Lowest linear gain the envelope accepts (-80 dB)
pub const MIN_VALID_GAIN: f64 = 0.0001;

/// Highest linear gain for the EQ and trim parameters
pub const MAX_GAIN_DEFAULT: f64 = 16.0;

pub const GAIN_KNOB_MIN_DB: f64 = -26.0;
pub const GAIN_KNOB_MAX_DB: f64 = 12.0;

/// The volume fader never boosts
pub const VOLUME_ENVELOPE_MAX_GAIN: f64 = 1.0;

/// Minimum point spacing as a share of the track duration
pub const MIN_GAP_RATIO: f64 = 0.004;

/// Absolute floor for point spacing (seconds)
pub const MIN_GAP_SEC: f64 = 0.01;

// ============================================================================
// Parameters
// ============================================================================

/// Automatable parameter of a mixtape track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeParam {
    Gain,
    High,
    Mid,
    Low,
    Volume,
}

/// Value range of one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeParamConfig {
    pub min_db: f64,
    pub max_db: f64,
    pub min_gain: f64,
    pub max_gain: f64,
    pub default_gain: f64,
}

impl EnvelopeParam {
    pub const ALL: [EnvelopeParam; 5] = [
        EnvelopeParam::Gain,
        EnvelopeParam::High,
        EnvelopeParam::Mid,
        EnvelopeParam::Low,
        EnvelopeParam::Volume,
    ];

    pub fn config(self) -> EnvelopeParamConfig {
        let max_gain = match self {
            EnvelopeParam::Volume => VOLUME_ENVELOPE_MAX_GAIN,
            _ => MAX_GAIN_DEFAULT,
        };
        EnvelopeParamConfig {
            min_db: GAIN_KNOB_MIN_DB,
            max_db: GAIN_KNOB_MAX_DB,
            min_gain: MIN_VALID_GAIN,
            max_gain,
            default_gain: 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnvelopeParam::Gain => "gain",
            EnvelopeParam::High => "high",
            EnvelopeParam::Mid => "mid",
            EnvelopeParam::Low => "low",
            EnvelopeParam::Volume => "volume",
        }
    }

    /// Field name of this envelope inside a track's `infoJson`
    pub fn track_field(self) -> &'static str {
        match self {
            EnvelopeParam::Gain => "gainEnvelope",
            EnvelopeParam::High => "highEnvelope",
            EnvelopeParam::Mid => "midEnvelope",
            EnvelopeParam::Low => "lowEnvelope",
            EnvelopeParam::Volume => "volumeEnvelope",
        }
    }

    /// Clamp a gain into this parameter's range; zero or non-finite becomes the default
    pub fn clamp_gain(self, gain: f64) -> f64 {
        let config = self.config();
        let gain = if gain.is_finite() && gain != 0.0 {
            gain
        } else {
            config.default_gain
        };
        gain.clamp(config.min_gain, config.max_gain)
    }
}

impl std::fmt::Display for EnvelopeParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Points
// ============================================================================

/// One envelope control point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainPoint {
    pub sec: f64,
    pub gain: f64,
}

impl GainPoint {
    pub fn new(sec: f64, gain: f64) -> Self {
        Self { sec, gain }
    }
}

/// Unvalidated point from a gesture or a persisted record
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawGainPoint {
    pub sec: Option<f64>,
    pub gain: Option<f64>,
}

impl From<GainPoint> for RawGainPoint {
    fn from(point: GainPoint) -> Self {
        Self {
            sec: Some(point.sec),
            gain: Some(point.gain),
        }
    }
}

impl From<(f64, f64)> for RawGainPoint {
    fn from((sec, gain): (f64, f64)) -> Self {
        Self {
            sec: Some(sec),
            gain: Some(gain),
        }
    }
}

/// Read points leniently from a JSON array
pub fn raw_points_from_json(value: &serde_json::Value) -> Vec<RawGainPoint> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| RawGainPoint {
                    sec: item.get("sec").and_then(serde_json::Value::as_f64),
                    gain: item.get("gain").and_then(serde_json::Value::as_f64),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Two-point envelope holding one gain over the whole duration
pub fn flat_envelope(param: EnvelopeParam, duration: f64, gain: Option<f64>) -> Vec<GainPoint> {
    let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
    let gain = param.clamp_gain(gain.unwrap_or(param.config().default_gain));
    vec![GainPoint::new(0.0, gain), GainPoint::new(duration, gain)]
}

/// Canonicalize an envelope
///
/// Drops points with negative or non-finite time and non-positive gain,
/// rounds (time to 4 places, gain to 6) and clamps, sorts by time and
/// collapses points closer than `TIME_EPSILON` keeping the later gain. The
/// result is pinned to start at 0 and, with a positive duration, to end at
/// the duration. An empty input gives a flat envelope when the duration is
/// known and nothing otherwise.
pub fn normalize_envelope_points<I>(param: EnvelopeParam, raw: I, duration: Option<f64>) -> Vec<GainPoint>
where
    I: IntoIterator,
    I::Item: Into<RawGainPoint>,
{
    let config = param.config();
    let safe_duration = duration.filter(|d| d.is_finite()).unwrap_or(0.0).max(0.0);

    let mut points: Vec<GainPoint> = raw
        .into_iter()
        .filter_map(|item| {
            let raw: RawGainPoint = item.into();
            let (sec, gain) = (raw.sec?, raw.gain?);
            if !sec.is_finite() || sec < 0.0 || !gain.is_finite() || gain <= 0.0 {
                return None;
            }
            let sec = if safe_duration > 0.0 { sec.min(safe_duration) } else { sec };
            Some(GainPoint::new(
                round_to(sec, 4),
                round_to(gain, 6).clamp(config.min_gain, config.max_gain),
            ))
        })
        .collect();

    if points.is_empty() {
        return match duration {
            Some(d) => flat_envelope(param, d, None),
            None => Vec::new(),
        };
    }

    points.sort_by(|a, b| a.sec.total_cmp(&b.sec));
    let mut unique: Vec<GainPoint> = Vec::with_capacity(points.len() + 2);
    for point in points {
        match unique.last_mut() {
            Some(last) if (point.sec - last.sec).abs() <= TIME_EPSILON => last.gain = point.gain,
            _ => unique.push(point),
        }
    }

    if unique[0].sec > TIME_EPSILON {
        let first_gain = unique[0].gain;
        unique.insert(0, GainPoint::new(0.0, first_gain));
    } else {
        unique[0].sec = 0.0;
    }

    if safe_duration > 0.0 {
        let last_index = unique.len() - 1;
        let last = unique[last_index];
        if safe_duration - last.sec > TIME_EPSILON {
            unique.push(GainPoint::new(safe_duration, last.gain));
        } else if last_index > 0 {
            unique[last_index].sec = safe_duration;
        }
    }
    unique
}

/// Sample an envelope at `sec` by linear interpolation
///
/// Before the first point and after the last the boundary gain holds. An
/// empty envelope yields `fallback`. The result is clamped to the parameter
/// range.
pub fn sample_envelope_at(param: EnvelopeParam, points: &[GainPoint], sec: f64, fallback: f64) -> f64 {
    let config = param.config();
    let sampled = match (points.first(), points.last()) {
        (Some(first), Some(last)) => {
            let sec = if sec.is_finite() { sec.max(0.0) } else { 0.0 };
            if sec <= first.sec {
                first.gain
            } else if sec >= last.sec {
                last.gain
            } else {
                let next_index = points.partition_point(|p| p.sec < sec);
                let next = points[next_index.min(points.len() - 1)];
                let prev = points[next_index.saturating_sub(1)];
                let span = (next.sec - prev.sec).max(TIME_EPSILON);
                let ratio = ((sec - prev.sec) / span).clamp(0.0, 1.0);
                prev.gain + (next.gain - prev.gain) * ratio
            }
        }
        _ => fallback,
    };
    sampled.clamp(config.min_gain, config.max_gain)
}

// ============================================================================
// Gain mapping
// ============================================================================

/// Linear gain to dB, flooring at `MIN_VALID_GAIN`
pub fn linear_gain_to_db(gain: f64) -> f64 {
    20.0 * gain.max(MIN_VALID_GAIN).log10()
}

pub fn db_to_linear_gain(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

fn zero_in_range(min_db: f64, max_db: f64) -> bool {
    min_db < -TIME_EPSILON && max_db > TIME_EPSILON
}

/// Vertical position (0 = top, 100 = bottom) of a gain in a dB range
///
/// When the range spans 0 dB, 0 dB sits at 50% and each half scales
/// separately; otherwise the mapping is linear in dB.
pub fn gain_to_y_percent(gain: f64, min_db: f64, max_db: f64) -> f64 {
    let min_abs = min_db.abs().max(0.0001);
    let max_abs = max_db.abs().max(0.0001);
    let db = linear_gain_to_db(gain).clamp(min_db, max_db);
    let y = if zero_in_range(min_db, max_db) {
        if db >= 0.0 {
            50.0 - (db / max_abs) * 50.0
        } else {
            50.0 + (db.abs() / min_abs) * 50.0
        }
    } else {
        let span = (max_db - min_db).max(0.0001);
        ((max_db - db) / span) * 100.0
    };
    y.clamp(0.0, 100.0)
}

/// Inverse of [`gain_to_y_percent`]
pub fn y_percent_to_gain(y_percent: f64, min_db: f64, max_db: f64) -> f64 {
    let y = y_percent.clamp(0.0, 100.0);
    let min_abs = min_db.abs().max(0.0001);
    let max_abs = max_db.abs().max(0.0001);
    let db = if zero_in_range(min_db, max_db) {
        if y <= 50.0 {
            ((50.0 - y) / 50.0) * max_abs
        } else {
            -((y - 50.0) / 50.0) * min_abs
        }
    } else {
        let span = (max_db - min_db).max(0.0001);
        max_db - (y / 100.0) * span
    };
    db_to_linear_gain(db)
}

impl EnvelopeParamConfig {
    pub fn gain_to_y_percent(&self, gain: f64) -> f64 {
        gain_to_y_percent(gain.clamp(self.min_gain, self.max_gain), self.min_db, self.max_db)
    }

    pub fn y_percent_to_gain(&self, y_percent: f64) -> f64 {
        y_percent_to_gain(y_percent, self.min_db, self.max_db).clamp(self.min_gain, self.max_gain)
    }
}

// ============================================================================
// Point edits
// ============================================================================

/// Minimum spacing between neighbouring points for a track duration
pub fn envelope_min_gap(duration: f64) -> f64 {
    MIN_GAP_SEC.max(duration * MIN_GAP_RATIO)
}

fn editable(points: &[GainPoint], duration: f64) -> bool {
    points.len() >= 2 && duration.is_finite() && duration > 0.0
}

/// Add a point at `sec`, or retarget the point already there
///
/// Near either boundary (within the minimum gap) the boundary point takes the
/// new gain. Near an existing interior neighbour, that neighbour takes it.
/// Returns the new sequence and the index of the affected point, which the
/// caller uses to continue a drag.
pub fn insert_point(
    param: EnvelopeParam,
    points: &[GainPoint],
    sec: f64,
    gain: f64,
    duration: f64,
) -> (Vec<GainPoint>, usize) {
    let mut next = points.to_vec();
    if !editable(points, duration) || !sec.is_finite() {
        return (next, 0);
    }
    let min_gap = envelope_min_gap(duration);
    let sec = sec.clamp(0.0, duration);
    let gain = round_to(param.clamp_gain(gain), 6);
    let last_index = next.len() - 1;

    if sec <= min_gap {
        next[0] = GainPoint::new(0.0, gain);
        return (next, 0);
    }
    if sec >= duration - min_gap {
        next[last_index] = GainPoint::new(round_to(duration, 4), gain);
        return (next, last_index);
    }

    let insert_index = next
        .iter()
        .position(|point| point.sec > sec)
        .unwrap_or(last_index);
    let prev_index = insert_index.saturating_sub(1);
    if (sec - next[prev_index].sec).abs() <= min_gap {
        next[prev_index].gain = gain;
        return (next, prev_index);
    }
    if (next[insert_index].sec - sec).abs() <= min_gap {
        next[insert_index].gain = gain;
        return (next, insert_index);
    }
    next.insert(insert_index, GainPoint::new(round_to(sec, 4), gain));
    (next, insert_index)
}

/// Move point `index` to `(sec, gain)`
///
/// Boundary points keep their time and only change gain. Interior points stay
/// at least the minimum gap away from both neighbours; when the neighbours
/// are too close to leave any room the sequence is returned unchanged.
pub fn move_point(
    param: EnvelopeParam,
    points: &[GainPoint],
    index: usize,
    sec: f64,
    gain: f64,
    duration: f64,
) -> Vec<GainPoint> {
    let mut next = points.to_vec();
    if !editable(points, duration) || index >= points.len() || !sec.is_finite() {
        return next;
    }
    let last_index = points.len() - 1;
    let target_sec = if index == 0 {
        0.0
    } else if index == last_index {
        duration
    } else {
        let min_gap = envelope_min_gap(duration);
        let min_allowed = points[index - 1].sec + min_gap;
        let max_allowed = points[index + 1].sec - min_gap;
        if min_allowed > max_allowed {
            log::trace!("move_point: no room for point {} between neighbours", index);
            return next;
        }
        sec.clamp(min_allowed, max_allowed)
    };
    next[index] = GainPoint::new(round_to(target_sec, 4), round_to(param.clamp_gain(gain), 6));
    next
}

/// Remove interior point `index`; boundary points and two-point envelopes are kept
pub fn delete_point(points: &[GainPoint], index: usize) -> Vec<GainPoint> {
    if points.len() <= 2 || index == 0 || index >= points.len() - 1 {
        return points.to_vec();
    }
    let mut next = points.to_vec();
    next.remove(index);
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(sec: f64, gain: f64) -> GainPoint {
        GainPoint::new(sec, gain)
    }

    #[test]
    fn test_param_configs() {
        assert_eq!(EnvelopeParam::Gain.config().max_gain, 16.0);
        assert_eq!(EnvelopeParam::Volume.config().max_gain, 1.0);
        assert_eq!(EnvelopeParam::Volume.clamp_gain(4.0), 1.0);
        assert_eq!(EnvelopeParam::Low.clamp_gain(0.0), 1.0);
        assert_eq!(EnvelopeParam::Low.clamp_gain(-2.0), MIN_VALID_GAIN);
        assert_eq!(EnvelopeParam::High.track_field(), "highEnvelope");
        let json = serde_json::to_string(&EnvelopeParam::Mid).unwrap();
        assert_eq!(json, "\"mid\"");
    }

    #[test]
    fn test_normalize_pins_boundaries() {
        let out = normalize_envelope_points(EnvelopeParam::Gain, [(5.0, 2.0), (2.0, 0.5)], Some(10.0));
        assert_eq!(out, vec![p(0.0, 0.5), p(2.0, 0.5), p(5.0, 2.0), p(10.0, 2.0)]);
    }

    #[test]
    fn test_normalize_collapses_and_filters() {
        let raw = vec![
            RawGainPoint::from((0.0, 0.9)),
            RawGainPoint::from((0.00004, 0.8)),
            RawGainPoint::from((3.0, 0.0)),
            RawGainPoint::from((-1.0, 1.0)),
            RawGainPoint { sec: Some(4.0), gain: None },
            RawGainPoint::from((9.99996, 1.5)),
        ];
        let out = normalize_envelope_points(EnvelopeParam::Volume, raw, Some(10.0));
        // same-time points keep the later gain in sorted order; volume caps at 1
        assert_eq!(out, vec![p(0.0, 0.8), p(10.0, 1.0)]);
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize_envelope_points(EnvelopeParam::Gain, Vec::<GainPoint>::new(), None).is_empty());
        let flat = normalize_envelope_points(EnvelopeParam::Gain, Vec::<GainPoint>::new(), Some(30.0));
        assert_eq!(flat, vec![p(0.0, 1.0), p(30.0, 1.0)]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = [(0.3, 0.25), (7.123456, 3.3333333), (12.0, 2.0), (7.12346, 1.0)];
        let once = normalize_envelope_points(EnvelopeParam::Gain, raw, Some(10.0));
        let twice = normalize_envelope_points(EnvelopeParam::Gain, once.clone(), Some(10.0));
        assert_eq!(once, twice);
        for pair in once.windows(2) {
            assert!(pair[0].sec < pair[1].sec);
        }
    }

    #[test]
    fn test_sample_interpolates_linearly() {
        let points = vec![p(0.0, 1.0), p(10.0, 2.0), p(20.0, 0.5)];
        let g = EnvelopeParam::Gain;
        assert_eq!(sample_envelope_at(g, &points, -5.0, 1.0), 1.0);
        assert!((sample_envelope_at(g, &points, 5.0, 1.0) - 1.5).abs() < 1e-9);
        assert!((sample_envelope_at(g, &points, 15.0, 1.0) - 1.25).abs() < 1e-9);
        assert_eq!(sample_envelope_at(g, &points, 10.0, 1.0), 2.0);
        assert_eq!(sample_envelope_at(g, &points, 100.0, 1.0), 0.5);
        assert_eq!(sample_envelope_at(g, &[], 3.0, 0.7), 0.7);
        assert_eq!(sample_envelope_at(EnvelopeParam::Volume, &points, 10.0, 1.0), 1.0);
    }

    #[test]
    fn test_db_and_y_mapping() {
        assert!((linear_gain_to_db(1.0)).abs() < 1e-12);
        assert!((linear_gain_to_db(0.0) + 80.0).abs() < 1e-9);
        assert!((db_to_linear_gain(-6.0) - 0.501_187).abs() < 1e-5);

        let config = EnvelopeParam::Gain.config();
        assert!((config.gain_to_y_percent(1.0) - 50.0).abs() < 1e-9);
        assert_eq!(config.gain_to_y_percent(100.0), 0.0);
        assert_eq!(config.gain_to_y_percent(MIN_VALID_GAIN), 100.0);
        for y in [0.0, 20.0, 50.0, 75.0, 100.0] {
            let gain = config.y_percent_to_gain(y);
            assert!((config.gain_to_y_percent(gain) - y).abs() < 1e-6);
        }
        // range without 0 dB maps linearly
        assert!((gain_to_y_percent(db_to_linear_gain(-10.0), -20.0, -5.0) - 100.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_insert_point() {
        let g = EnvelopeParam::Gain;
        let flat = flat_envelope(g, 100.0, None);
        // min gap is 0.4 s for 100 s
        let (points, index) = insert_point(g, &flat, 50.0, 2.0, 100.0);
        assert_eq!(points, vec![p(0.0, 1.0), p(50.0, 2.0), p(100.0, 1.0)]);
        assert_eq!(index, 1);

        let (points, index) = insert_point(g, &points, 50.2, 0.5, 100.0);
        assert_eq!(index, 1);
        assert_eq!(points[1], p(50.0, 0.5));

        let (points, index) = insert_point(g, &points, 0.3, 3.0, 100.0);
        assert_eq!((index, points[0]), (0, p(0.0, 3.0)));

        let (points, index) = insert_point(g, &points, 99.9, 3.0, 100.0);
        assert_eq!((index, points[2]), (2, p(100.0, 3.0)));
    }

    #[test]
    fn test_move_point_respects_boundaries_and_gap() {
        let g = EnvelopeParam::Gain;
        let points = vec![p(0.0, 1.0), p(50.0, 1.0), p(100.0, 1.0)];
        let moved = move_point(g, &points, 0, 30.0, 2.0, 100.0);
        assert_eq!(moved[0], p(0.0, 2.0));
        let moved = move_point(g, &points, 2, 30.0, 2.0, 100.0);
        assert_eq!(moved[2], p(100.0, 2.0));
        let moved = move_point(g, &points, 1, 99.9, 2.0, 100.0);
        assert_eq!(moved[1], p(99.6, 2.0));
        let moved = move_point(g, &points, 1, -5.0, 2.0, 100.0);
        assert_eq!(moved[1], p(0.4, 2.0));
        assert_eq!(move_point(g, &points, 7, 1.0, 1.0, 100.0), points);
    }

    #[test]
    fn test_delete_point_keeps_boundaries() {
        let points = vec![p(0.0, 1.0), p(50.0, 1.0), p(100.0, 1.0)];
        assert_eq!(delete_point(&points, 1), vec![p(0.0, 1.0), p(100.0, 1.0)]);
        assert_eq!(delete_point(&points, 0), points);
        assert_eq!(delete_point(&points, 2), points);
        assert_eq!(delete_point(&points[..2], 1), points[..2].to_vec());
    }

    #[test]
    fn test_lone_point_on_near_zero_duration() {
        let out = normalize_envelope_points(EnvelopeParam::Gain, [(0.0, 0.8)], Some(0.00005));
        assert_eq!(out, vec![GainPoint::new(0.0, 0.8)]);
        let out = normalize_envelope_points(EnvelopeParam::Gain, [(0.0, 0.8)], Some(4.0));
        assert_eq!(out, vec![GainPoint::new(0.0, 0.8), GainPoint::new(4.0, 0.8)]);
    }
}
