//! Multi-resolution min/max waveform pyramid
//!
//! Level 0 is the decoded buffer. Each further level halves the frame count by
//! pairwise min/max reduction, so a transient that exists in any source frame
//! survives into every coarser level. The timeline picks the level whose
//! decimation factor best matches how many frames land on one pixel.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::decode::RawWaveformData;

/// Maximum number of levels per pyramid (base + 7 reductions)
pub const MAX_PYRAMID_LEVELS: usize = 8;

/// Largest decimation factor the level selector aims for
pub const MAX_TARGET_FACTOR: u32 = 128;

/// One pyramid level: a waveform buffer plus its decimation factor
#[derive(Debug, Clone, PartialEq)]
pub struct RawWaveformLevel {
    pub data: RawWaveformData,
    /// Power-of-two downsample factor relative to level 0
    pub factor: u32,
}

/// Per-channel peaks for a frame range
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColumnPeaks {
    pub min_left: f32,
    pub max_left: f32,
    pub min_right: f32,
    pub max_right: f32,
}

impl RawWaveformLevel {
    /// Reduce frames `start..end` to one min/max pair per channel
    ///
    /// Returns `None` when the range holds no usable frame.
    pub fn column_peaks(&self, start: usize, end: usize) -> Option<ColumnPeaks> {
        let end = end.min(usable_frames(&self.data));
        if start >= end {
            return None;
        }
        let d = &self.data;
        let fold_min = |values: &[f32]| values[start..end].iter().copied().fold(f32::INFINITY, f32::min);
        let fold_max = |values: &[f32]| values[start..end].iter().copied().fold(f32::NEG_INFINITY, f32::max);
        Some(ColumnPeaks {
            min_left: fold_min(&d.min_left),
            max_left: fold_max(&d.max_left),
            min_right: fold_min(&d.min_right),
            max_right: fold_max(&d.max_right),
        })
    }
}

/// `frames` bounded by the shortest of the four arrays
fn usable_frames(data: &RawWaveformData) -> usize {
    data.frames
        .min(data.min_left.len())
        .min(data.max_left.len())
        .min(data.min_right.len())
        .min(data.max_right.len())
}

fn halve_min(source: &[f32], frames: usize, next_frames: usize) -> Vec<f32> {
    (0..next_frames)
        .map(|i| {
            let i0 = i * 2;
            let i1 = (i0 + 1).min(frames - 1);
            source[i0].min(source[i1])
        })
        .collect()
}

fn halve_max(source: &[f32], frames: usize, next_frames: usize) -> Vec<f32> {
    (0..next_frames)
        .map(|i| {
            let i0 = i * 2;
            let i1 = (i0 + 1).min(frames - 1);
            source[i0].max(source[i1])
        })
        .collect()
}

/// Build the full pyramid for one decoded buffer
///
/// Stops when the next halving would leave one frame or fewer, or once
/// `MAX_PYRAMID_LEVELS` levels exist. A `frames` count larger than the
/// sample arrays is cut down to the shortest array.
pub fn build_pyramid(mut raw: RawWaveformData) -> Vec<RawWaveformLevel> {
    let usable = usable_frames(&raw);
    if usable < raw.frames {
        log::debug!("build_pyramid: frames {} exceed sample arrays, using {}", raw.frames, usable);
        raw.frames = usable;
    }
    let mut levels = Vec::with_capacity(MAX_PYRAMID_LEVELS);
    levels.push(RawWaveformLevel { data: raw, factor: 1 });

    while levels.len() < MAX_PYRAMID_LEVELS {
        let current = &levels[levels.len() - 1];
        let frames = current.data.frames;
        let next_frames = frames / 2;
        if next_frames <= 1 {
            break;
        }
        let d = &current.data;
        let next = RawWaveformLevel {
            data: RawWaveformData {
                duration: d.duration,
                sample_rate: d.sample_rate,
                rate: d.rate / 2.0,
                frames: next_frames,
                min_left: halve_min(&d.min_left, frames, next_frames),
                max_left: halve_max(&d.max_left, frames, next_frames),
                min_right: halve_min(&d.min_right, frames, next_frames),
                max_right: halve_max(&d.max_right, frames, next_frames),
            },
            factor: current.factor * 2,
        };
        levels.push(next);
    }

    log::debug!(
        "build_pyramid: {} levels, base {} frames",
        levels.len(),
        levels[0].data.frames
    );
    levels
}

/// Ideal decimation factor for a samples-per-pixel ratio
///
/// Largest power of two not above the ratio, capped at `MAX_TARGET_FACTOR`.
pub fn target_factor(samples_per_pixel: f64) -> u32 {
    if !samples_per_pixel.is_finite() || samples_per_pixel <= 1.0 {
        return 1;
    }
    let mut target = 1u32;
    while f64::from(target * 2) <= samples_per_pixel && target < MAX_TARGET_FACTOR {
        target *= 2;
    }
    target
}

/// Pick the level best matching `samples_per_pixel`
///
/// Non-finite or ≤ 1 ratios always get the base level. Ties go to the finer
/// level. Returns `None` only for an empty pyramid.
pub fn select_level(levels: &[RawWaveformLevel], samples_per_pixel: f64) -> Option<&RawWaveformLevel> {
    let base = levels.first()?;
    if !samples_per_pixel.is_finite() || samples_per_pixel <= 1.0 {
        return Some(base);
    }
    let target = i64::from(target_factor(samples_per_pixel));
    let mut best = base;
    let mut best_diff = (i64::from(base.factor) - target).abs();
    for level in levels {
        let diff = (i64::from(level.factor) - target).abs();
        if diff < best_diff {
            best = level;
            best_diff = diff;
        }
    }
    Some(best)
}

// ============================================================================
// Cache
// ============================================================================

/// Shared, immutable pyramid for one file
pub type SharedPyramid = Arc<[RawWaveformLevel]>;

/// Per-file pyramid cache owned by one mixtape session
///
/// Lookups take a read lock. A pyramid is built at most once per file; if two
/// callers race, both build and the later insert wins, which is harmless
/// because both values are identical and immutable.
#[derive(Debug, Default)]
pub struct PyramidCache {
    levels: RwLock<HashMap<String, SharedPyramid>>,
}

impl PyramidCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached pyramid for a file, if any
    pub fn get(&self, file_path: &str) -> Option<SharedPyramid> {
        self.levels
            .read()
            .ok()
            .and_then(|map| map.get(file_path).cloned())
    }

    /// Cached pyramid for a file, building it from `raw` on first request
    pub fn get_or_build(&self, file_path: &str, raw: &RawWaveformData) -> SharedPyramid {
        if let Some(existing) = self.get(file_path) {
            return existing;
        }
        let pyramid: SharedPyramid = build_pyramid(raw.clone()).into();
        if let Ok(mut map) = self.levels.write() {
            map.insert(file_path.to_string(), pyramid.clone());
        }
        pyramid
    }

    /// Resolve the level for a file and ratio, building the pyramid if needed
    pub fn resolve_level(
        &self,
        file_path: &str,
        raw: &RawWaveformData,
        samples_per_pixel: f64,
    ) -> Option<RawWaveformLevel> {
        let pyramid = self.get_or_build(file_path, raw);
        select_level(&pyramid, samples_per_pixel).cloned()
    }

    /// Drop a file's pyramid after its raw data changed
    pub fn invalidate(&self, file_path: &str) -> bool {
        let removed = self
            .levels
            .write()
            .map(|mut map| map.remove(file_path).is_some())
            .unwrap_or(false);
        if removed {
            log::debug!("PyramidCache: invalidated {}", file_path);
        }
        removed
    }

    /// Drop everything (session teardown)
    pub fn clear(&self) {
        if let Ok(mut map) = self.levels.write() {
            map.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.levels.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
