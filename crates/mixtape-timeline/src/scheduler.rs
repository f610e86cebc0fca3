//! Tile scheduling
//!
//! [`TileScheduler`] is the single owner of a mixtape's decoded waveforms,
//! their pyramids, the rendered tile cache and the render version. It plans
//! which tiles the worker should render and accepts results back, dropping
//! any that were planned for an earlier render version.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use mixtape_core::config::TimelineConfig;
use mixtape_core::waveform::{select_level, PyramidCache, RawWaveformData};

use crate::cache::{TileCache, TileCacheKey};
use crate::layout::{TimelineLayout, TimelineTrackLayout};
use crate::render::{RenderVersion, TimelineViewport};
use crate::tiles::{plan_pre_render_tasks, pre_render_range, WaveformPreRenderTask};
use crate::viewport::pre_render_percent;
use crate::worker::{TilePeaks, TileRenderRequest, TileRenderResult};
use crate::zoom::{quantize_render_zoom, zoom_bucket};

/// What happened to a result handed to [`TileScheduler::apply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Planned for an older render version or a file no longer loaded
    Stale,
    /// The worker could not render the tile
    Failed,
}

/// Running counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub planned: u64,
    pub applied: u64,
    pub stale_dropped: u64,
    pub failed: u64,
    pub invalidations: u64,
}

/// Planned/finished counts for the current render version
#[derive(Debug, Clone, Copy, Default)]
struct Generation {
    planned: usize,
    finished: usize,
}

#[derive(Debug)]
pub struct TileScheduler {
    config: TimelineConfig,
    waveforms: HashMap<String, RawWaveformData>,
    pyramids: PyramidCache,
    tiles: TileCache,
    version: RenderVersion,
    render_zoom: f64,
    track_revision: Option<u64>,
    pending: HashSet<TileCacheKey>,
    generation: Generation,
    stats: SchedulerStats,
}

fn cache_key(task: &WaveformPreRenderTask) -> TileCacheKey {
    TileCacheKey::new(task.key.file_path.clone(), task.key.tile_index, task.level_factor)
}

/// Pyramid level factor for a laid-out track at the given device pixel ratio
fn resolve_factor(
    waveforms: &HashMap<String, RawWaveformData>,
    pyramids: &PyramidCache,
    item: &TimelineTrackLayout,
    pixel_ratio: f64,
) -> Option<u32> {
    let raw = waveforms.get(&item.track.file_path)?;
    if raw.frames == 0 || item.width <= 0.0 {
        return None;
    }
    let samples_per_pixel = raw.frames as f64 / (item.width * pixel_ratio);
    let pyramid = pyramids.get_or_build(&item.track.file_path, raw);
    select_level(&pyramid, samples_per_pixel).map(|level| level.factor)
}

impl TileScheduler {
    pub fn new(config: TimelineConfig) -> Self {
        let config = config.sanitized();
        let render_zoom = quantize_render_zoom(1.0, &config);
        Self {
            tiles: TileCache::new(config.tile_cache_limit),
            config,
            waveforms: HashMap::new(),
            pyramids: PyramidCache::new(),
            version: RenderVersion::new(),
            render_zoom,
            track_revision: None,
            pending: HashSet::new(),
            generation: Generation::default(),
            stats: SchedulerStats::default(),
        }
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn render_version(&self) -> u64 {
        self.version.current()
    }

    /// Zoom layouts passed to [`plan`](Self::plan) must be built at
    pub fn render_zoom(&self) -> f64 {
        self.render_zoom
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Start a new render generation
    ///
    /// The tile cache is emptied in the same step, so nothing rendered for an
    /// earlier version can be served afterwards.
    pub fn invalidate(&mut self) -> u64 {
        let version = self.version.bump();
        self.tiles.clear();
        self.pending.clear();
        self.generation = Generation::default();
        self.stats.invalidations += 1;
        log::debug!("TileScheduler: render version {}", version);
        version
    }

    /// Follow a zoom change; returns `true` when the render zoom moved
    pub fn set_zoom(&mut self, zoom: f64) -> bool {
        let quantized = quantize_render_zoom(zoom, &self.config);
        if zoom_bucket(quantized) == zoom_bucket(self.render_zoom) {
            return false;
        }
        log::debug!("TileScheduler: render zoom {:.3} -> {:.3}", self.render_zoom, quantized);
        self.render_zoom = quantized;
        self.invalidate();
        true
    }

    /// Follow the session's track revision; returns `true` on a change
    pub fn sync_tracks(&mut self, revision: u64) -> bool {
        if self.track_revision == Some(revision) {
            return false;
        }
        self.track_revision = Some(revision);
        self.invalidate();
        true
    }

    // ===== Waveforms =====

    /// Store decoded data for a file
    ///
    /// Replacing existing data starts a new render generation, since tiles
    /// of the old data may still be in flight.
    pub fn set_waveform(&mut self, file_path: impl Into<String>, raw: RawWaveformData) {
        let file_path = file_path.into();
        self.pyramids.invalidate(&file_path);
        let replaced = self.waveforms.insert(file_path.clone(), raw).is_some();
        if replaced {
            log::debug!("TileScheduler: waveform replaced for {}", file_path);
            self.invalidate();
        }
    }

    /// Forget a file's data
    ///
    /// Starts a new render generation when data was loaded, so tiles planned
    /// from it can't be applied after the file is loaded again.
    pub fn remove_waveform(&mut self, file_path: &str) -> bool {
        let removed = self.waveforms.remove(file_path).is_some();
        self.pyramids.invalidate(file_path);
        if removed {
            log::debug!("TileScheduler: waveform removed for {}", file_path);
            self.invalidate();
        }
        removed
    }

    pub fn has_waveform(&self, file_path: &str) -> bool {
        self.waveforms.contains_key(file_path)
    }

    pub fn waveform(&self, file_path: &str) -> Option<&RawWaveformData> {
        self.waveforms.get(file_path)
    }

    // ===== Planning =====

    /// Tiles to render for the viewport that are neither cached nor in flight
    ///
    /// Returns nothing when `layout` was built at a different zoom than the
    /// current render zoom.
    pub fn plan(&mut self, layout: &TimelineLayout, viewport: &TimelineViewport) -> Vec<TileRenderRequest> {
        if zoom_bucket(layout.zoom) != zoom_bucket(self.render_zoom) {
            log::debug!(
                "TileScheduler: layout zoom {:.3} does not match render zoom {:.3}",
                layout.zoom,
                self.render_zoom
            );
            return Vec::new();
        }
        let pixel_ratio = viewport.effective_pixel_ratio();
        let version = self.version.current();
        let range = pre_render_range(viewport.scroll_left, viewport.width, self.config.pre_render_buffer);

        let (waveforms, pyramids) = (&self.waveforms, &self.pyramids);
        let tasks = plan_pre_render_tasks(layout, range, version, &self.config, |item| {
            resolve_factor(waveforms, pyramids, item, pixel_ratio)
        });

        let mut requests = Vec::new();
        for task in tasks {
            let key = cache_key(&task);
            if self.tiles.is_current(&key, version) || self.pending.contains(&key) {
                continue;
            }
            let Some(pyramid) = self.pyramids.get(&task.key.file_path) else {
                continue;
            };
            let columns = ((task.tile.width * pixel_ratio).ceil() as usize).max(1);
            self.pending.insert(key);
            requests.push(TileRenderRequest { task, pyramid, columns });
        }

        self.generation.planned += requests.len();
        self.stats.planned += requests.len() as u64;
        if !requests.is_empty() {
            log::debug!(
                "TileScheduler: planned {} tiles at version {}",
                requests.len(),
                version
            );
        }
        requests
    }

    /// Accept a worker result
    pub fn apply(&mut self, result: TileRenderResult) -> ApplyOutcome {
        let version = self.version.current();
        let task = &result.task;
        if task.key.render_version != version || !self.waveforms.contains_key(&task.key.file_path) {
            self.stats.stale_dropped += 1;
            log::debug!(
                "TileScheduler: dropped stale tile {}#{} (version {}, current {})",
                task.key.file_path,
                task.key.tile_index,
                task.key.render_version,
                version
            );
            return ApplyOutcome::Stale;
        }

        let key = cache_key(task);
        self.pending.remove(&key);
        self.generation.finished += 1;
        match result.outcome {
            Ok(peaks) => {
                self.tiles.insert(key, version, peaks);
                self.stats.applied += 1;
                ApplyOutcome::Applied
            }
            Err(e) => {
                log::warn!("TileScheduler: tile render failed: {}", e);
                self.stats.failed += 1;
                ApplyOutcome::Failed
            }
        }
    }

    /// Rendered tile for display
    pub fn tile(&mut self, file_path: &str, tile_index: u32, level_factor: u32) -> Option<Arc<TilePeaks>> {
        self.tiles.get(&TileCacheKey::new(file_path, tile_index, level_factor))
    }

    pub fn cached_tiles(&self) -> usize {
        self.tiles.len()
    }

    pub fn pending_tiles(&self) -> usize {
        self.pending.len()
    }

    /// Share of this generation's planned tiles that have come back
    pub fn progress_percent(&self) -> u8 {
        pre_render_percent(self.generation.finished, self.generation.planned)
    }

    /// Drop all waveforms and tiles (mixtape closed)
    pub fn clear(&mut self) {
        self.waveforms.clear();
        self.pyramids.clear();
        self.track_revision = None;
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::layout::tests::track;
    use crate::layout::{build_layout, LaneAssignment};
    use crate::worker::tests::ramp_waveform;
    use crate::worker::TileRenderWorker;

    fn viewport(width: f64) -> TimelineViewport {
        TimelineViewport {
            width,
            height: 300.0,
            ..TimelineViewport::default()
        }
    }

    fn scheduler_with_track(duration: &str) -> (TileScheduler, TimelineLayout) {
        let mut scheduler = TileScheduler::new(TimelineConfig::default());
        let tracks = vec![track("a", 1, duration)];
        scheduler.set_waveform("/music/a.wav", ramp_waveform(48_000, 600.0));
        let layout = build_layout(
            &tracks,
            scheduler.render_zoom(),
            &LaneAssignment::RoundRobin,
            scheduler.config(),
            |_| Some(600.0),
        );
        (scheduler, layout)
    }

    #[test]
    fn test_stale_result_is_dropped() {
        let (mut scheduler, layout) = scheduler_with_track("10:00");
        for _ in 0..3 {
            scheduler.invalidate();
        }
        assert_eq!(scheduler.render_version(), 3);

        let requests = scheduler.plan(&layout, &viewport(800.0));
        assert!(!requests.is_empty());
        let result = requests[0].render();
        assert_eq!(result.task.key.render_version, 3);

        assert_eq!(scheduler.invalidate(), 4);
        assert_eq!(scheduler.apply(result), ApplyOutcome::Stale);
        assert_eq!(scheduler.cached_tiles(), 0);
        assert_eq!(scheduler.stats().stale_dropped, 1);
    }

    #[test]
    fn test_plan_skips_cached_and_pending() {
        let (mut scheduler, layout) = scheduler_with_track("10:00");
        let first = scheduler.plan(&layout, &viewport(800.0));
        // 600 s at 7.2 px/s is 4320 px; the buffered range 0..1760 covers two tiles
        assert_eq!(first.len(), 2);
        assert!(scheduler.plan(&layout, &viewport(800.0)).is_empty());
        assert_eq!(scheduler.pending_tiles(), 2);
        assert_eq!(scheduler.progress_percent(), 0);

        for request in &first {
            assert_eq!(scheduler.apply(request.render()), ApplyOutcome::Applied);
        }
        assert_eq!(scheduler.progress_percent(), 100);
        assert_eq!(scheduler.cached_tiles(), 2);
        assert!(scheduler.plan(&layout, &viewport(800.0)).is_empty());

        let task = &first[0].task;
        let tile = scheduler.tile(&task.key.file_path, task.tile.index, task.level_factor).unwrap();
        assert_eq!(tile.columns.len(), 1200);
    }

    #[test]
    fn test_zoom_change_invalidates() {
        let (mut scheduler, layout) = scheduler_with_track("10:00");
        assert_eq!(scheduler.render_zoom(), 0.9);
        assert!(!scheduler.set_zoom(0.95));
        assert_eq!(scheduler.render_version(), 0);
        assert!(scheduler.set_zoom(2.0));
        assert_eq!(scheduler.render_version(), 1);
        // the old layout no longer matches
        assert!(scheduler.plan(&layout, &viewport(800.0)).is_empty());
        assert!(scheduler.sync_tracks(7));
        assert!(!scheduler.sync_tracks(7));
    }

    #[test]
    fn test_removed_and_replaced_waveforms() {
        let (mut scheduler, layout) = scheduler_with_track("10:00");
        let requests = scheduler.plan(&layout, &viewport(800.0));
        scheduler.remove_waveform("/music/a.wav");
        assert_eq!(scheduler.apply(requests[0].render()), ApplyOutcome::Stale);
        assert!(scheduler.plan(&layout, &viewport(800.0)).is_empty());

        assert_eq!(scheduler.render_version(), 1);
        assert!(!scheduler.remove_waveform("/music/a.wav"));
        assert_eq!(scheduler.render_version(), 1);

        scheduler.set_waveform("/music/a.wav", ramp_waveform(48_000, 600.0));
        assert_eq!(scheduler.render_version(), 1);
        scheduler.set_waveform("/music/a.wav", ramp_waveform(24_000, 600.0));
        assert_eq!(scheduler.render_version(), 2);
    }

    #[test]
    fn test_result_from_data_loaded_before_removal_is_stale() {
        let (mut scheduler, layout) = scheduler_with_track("10:00");
        let requests = scheduler.plan(&layout, &viewport(800.0));
        let old = requests[0].render();

        scheduler.remove_waveform("/music/a.wav");
        scheduler.set_waveform("/music/a.wav", ramp_waveform(48_000, 30.0));
        assert_eq!(scheduler.apply(old), ApplyOutcome::Stale);
        assert_eq!(scheduler.cached_tiles(), 0);

        // tiles planned from the new data are accepted
        let fresh = scheduler.plan(&layout, &viewport(800.0));
        assert!(!fresh.is_empty());
        assert_eq!(scheduler.apply(fresh[0].render()), ApplyOutcome::Applied);
    }

    #[test]
    fn test_worker_round_trip() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (mut scheduler, layout) = scheduler_with_track("10:00");
        let worker = TileRenderWorker::spawn().unwrap();
        let requests = scheduler.plan(&layout, &viewport(400.0));
        let expected = requests.len();
        worker.submit(requests).unwrap();

        let mut applied = 0;
        while applied < expected {
            let result = worker
                .recv_timeout(Duration::from_secs(5))
                .expect("tile result");
            assert_eq!(scheduler.apply(result), ApplyOutcome::Applied);
            applied += 1;
        }
        assert_eq!(scheduler.stats().applied, expected as u64);
    }
}
