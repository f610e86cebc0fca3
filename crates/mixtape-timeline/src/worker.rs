//! Background tile rendering
//!
//! Tiles are reduced from an immutable, `Arc`-shared pyramid level to one
//! min/max pair per output column. The host plans a batch, submits it to the
//! [`TileRenderWorker`] and polls results from its tick handler:
//!
//! ```ignore
//! let worker = TileRenderWorker::spawn()?;
//! worker.submit(scheduler.plan(&layout, &viewport))?;
//!
//! // later, on the UI thread
//! while let Some(result) = worker.try_recv() {
//!     scheduler.apply(result);
//! }
//! ```
//!
//! Results are not cancelled when the view changes; the scheduler drops any
//! result whose render version is no longer current.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use rayon::prelude::*;
use thiserror::Error;

use mixtape_core::waveform::{ColumnPeaks, RawWaveformLevel, SharedPyramid};
use mixtape_core::worker::{spawn_named, WorkerError, WorkerResult};

use crate::tiles::WaveformPreRenderTask;

/// Errors rendering a single tile
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TileRenderError {
    #[error("no pyramid level with factor {factor} for {file_path}")]
    LevelMissing { file_path: String, factor: u32 },

    #[error("waveform for {0} has no frames")]
    EmptyLevel(String),

    #[error("tile {tile_index} of {file_path} has no usable extent")]
    InvalidGeometry { file_path: String, tile_index: u32 },

    #[error("tile requested with zero columns")]
    NoColumns,
}

/// Rendered tile: one peak pair per channel per column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TilePeaks {
    pub columns: Vec<ColumnPeaks>,
    /// Audio time at the tile's left edge (seconds)
    pub start_time: f64,
    /// Audio time at the tile's right edge (seconds)
    pub end_time: f64,
    /// Factor of the level the peaks were read from
    pub level_factor: u32,
}

/// Render one tile from a pyramid level
///
/// The tile's share of the track width maps linearly onto the level's
/// frames. Columns covering no frame come out as silence.
pub fn render_tile(
    level: &RawWaveformLevel,
    task: &WaveformPreRenderTask,
    columns: usize,
) -> Result<TilePeaks, TileRenderError> {
    if columns == 0 {
        return Err(TileRenderError::NoColumns);
    }
    let frames = level.data.frames;
    if frames == 0 {
        return Err(TileRenderError::EmptyLevel(task.key.file_path.clone()));
    }
    let tile = task.tile;
    if !(task.track_width > 0.0) || !(tile.width > 0.0) {
        return Err(TileRenderError::InvalidGeometry {
            file_path: task.key.file_path.clone(),
            tile_index: tile.index,
        });
    }

    let start_ratio = (tile.start / task.track_width).clamp(0.0, 1.0);
    let end_ratio = (tile.end() / task.track_width).clamp(start_ratio, 1.0);
    let frame_start = start_ratio * frames as f64;
    let frame_span = (end_ratio - start_ratio) * frames as f64;

    let peaks = (0..columns)
        .map(|column| {
            let lo = frame_start + frame_span * column as f64 / columns as f64;
            let hi = frame_start + frame_span * (column + 1) as f64 / columns as f64;
            let first = lo.floor() as usize;
            let last = (hi.ceil() as usize).max(first + 1);
            level.column_peaks(first, last).unwrap_or_default()
        })
        .collect();

    let duration = if task.duration_seconds > 0.0 {
        task.duration_seconds
    } else {
        level.data.duration
    };

    Ok(TilePeaks {
        columns: peaks,
        start_time: start_ratio * duration,
        end_time: end_ratio * duration,
        level_factor: level.factor,
    })
}

/// A tile to render with the pyramid it is read from
#[derive(Clone)]
pub struct TileRenderRequest {
    pub task: WaveformPreRenderTask,
    pub pyramid: SharedPyramid,
    /// Output columns (device pixels across the tile)
    pub columns: usize,
}

impl std::fmt::Debug for TileRenderRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileRenderRequest")
            .field("task", &self.task)
            .field("pyramid", &format!("<{} levels>", self.pyramid.len()))
            .field("columns", &self.columns)
            .finish()
    }
}

impl TileRenderRequest {
    /// Render on the calling thread
    pub fn render(&self) -> TileRenderResult {
        let outcome = self
            .pyramid
            .iter()
            .find(|level| level.factor == self.task.level_factor)
            .ok_or_else(|| TileRenderError::LevelMissing {
                file_path: self.task.key.file_path.clone(),
                factor: self.task.level_factor,
            })
            .and_then(|level| render_tile(level, &self.task, self.columns))
            .map(Arc::new);
        TileRenderResult {
            task: self.task.clone(),
            outcome,
        }
    }
}

/// Outcome of one request, tagged with the task it was planned from
#[derive(Debug, Clone)]
pub struct TileRenderResult {
    pub task: WaveformPreRenderTask,
    pub outcome: Result<Arc<TilePeaks>, TileRenderError>,
}

enum RenderCommand {
    Batch(Vec<TileRenderRequest>),
    Shutdown,
}

/// Background thread rendering tile batches
///
/// Tiles of one batch render in parallel on the rayon pool; results are sent
/// back in request order once the batch finishes.
pub struct TileRenderWorker {
    command_tx: Sender<RenderCommand>,
    result_rx: Receiver<TileRenderResult>,
    thread_handle: Option<JoinHandle<()>>,
}

impl TileRenderWorker {
    pub fn spawn() -> WorkerResult<Self> {
        let (command_tx, command_rx) = channel::unbounded::<RenderCommand>();
        let (result_tx, result_rx) = channel::unbounded::<TileRenderResult>();

        let handle = spawn_named("mixtape-tile-render", move || {
            render_thread(command_rx, result_tx);
        })?;

        log::info!("TileRenderWorker background thread started");

        Ok(Self {
            command_tx,
            result_rx,
            thread_handle: Some(handle),
        })
    }

    /// Queue a batch (non-blocking); empty batches are ignored
    pub fn submit(&self, batch: Vec<TileRenderRequest>) -> WorkerResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.command_tx
            .send(RenderCommand::Batch(batch))
            .map_err(|_| WorkerError::Disconnected("tile render"))
    }

    /// Completed result, if any (non-blocking)
    pub fn try_recv(&self) -> Option<TileRenderResult> {
        match self.result_rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::error!("TileRenderWorker thread disconnected unexpectedly");
                None
            }
        }
    }

    /// Wait up to `timeout` for a result
    pub fn recv_timeout(&self, timeout: Duration) -> Option<TileRenderResult> {
        match self.result_rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                log::error!("TileRenderWorker thread disconnected unexpectedly");
                None
            }
        }
    }

    /// Every result currently available
    pub fn drain(&self) -> Vec<TileRenderResult> {
        self.result_rx.try_iter().collect()
    }

    /// Stop after the batch in progress; queued batches are discarded
    pub fn shutdown(&mut self) {
        let _ = self.command_tx.send(RenderCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for TileRenderWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn render_thread(rx: Receiver<RenderCommand>, tx: Sender<TileRenderResult>) {
    log::debug!("Tile render thread starting");

    while let Ok(command) = rx.recv() {
        let batch = match command {
            RenderCommand::Batch(batch) => batch,
            RenderCommand::Shutdown => break,
        };
        let start_time = std::time::Instant::now();
        let results: Vec<TileRenderResult> = batch.par_iter().map(TileRenderRequest::render).collect();
        log::debug!(
            "Rendered {} tiles in {:.1}ms",
            results.len(),
            start_time.elapsed().as_secs_f64() * 1000.0
        );
        for result in results {
            if tx.send(result).is_err() {
                log::debug!("Tile render thread: receiver dropped, exiting");
                return;
            }
        }
    }

    log::debug!("Tile render thread exiting");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use mixtape_core::waveform::{build_pyramid, RawWaveformData};

    use crate::tiles::{TileKey, WaveformTile};

    pub(crate) fn ramp_waveform(frames: usize, duration: f64) -> RawWaveformData {
        let max: Vec<f32> = (0..frames).map(|i| i as f32 / frames as f32).collect();
        let min: Vec<f32> = max.iter().map(|v| -v).collect();
        RawWaveformData {
            duration,
            sample_rate: 44_100.0,
            rate: frames as f64 / duration,
            frames,
            min_left: min.clone(),
            max_left: max.clone(),
            min_right: min,
            max_right: max,
        }
    }

    pub(crate) fn task(file_path: &str, tile: WaveformTile, track_width: f64, version: u64, factor: u32) -> WaveformPreRenderTask {
        WaveformPreRenderTask {
            key: TileKey {
                file_path: file_path.to_string(),
                tile_index: tile.index,
                render_version: version,
                zoom_bucket: 1000,
            },
            track_id: "t".to_string(),
            lane_index: 0,
            tile,
            track_width,
            duration_seconds: 10.0,
            level_factor: factor,
        }
    }

    #[test]
    fn test_render_tile_maps_frames() {
        let pyramid = build_pyramid(ramp_waveform(1000, 10.0));
        let half = WaveformTile { index: 1, start: 50.0, width: 50.0 };
        let peaks = render_tile(&pyramid[0], &task("/a.wav", half, 100.0, 1, 1), 5).unwrap();
        assert_eq!(peaks.columns.len(), 5);
        assert!((peaks.start_time - 5.0).abs() < 1e-9);
        assert!((peaks.end_time - 10.0).abs() < 1e-9);
        // second half of the ramp: first column covers frames 500..600
        assert!((peaks.columns[0].max_left - 599.0 / 1000.0).abs() < 1e-6);
        assert!((peaks.columns[0].min_left + 599.0 / 1000.0).abs() < 1e-6);
        assert!(peaks.columns.windows(2).all(|w| w[0].max_left < w[1].max_left));
    }

    #[test]
    fn test_render_tile_errors() {
        let pyramid = build_pyramid(ramp_waveform(100, 1.0));
        let tile = WaveformTile { index: 0, start: 0.0, width: 10.0 };
        assert_eq!(render_tile(&pyramid[0], &task("/a.wav", tile, 10.0, 1, 1), 0), Err(TileRenderError::NoColumns));
        assert!(matches!(
            render_tile(&pyramid[0], &task("/a.wav", tile, 0.0, 1, 1), 4),
            Err(TileRenderError::InvalidGeometry { .. })
        ));

        let request = TileRenderRequest {
            task: task("/a.wav", tile, 10.0, 1, 1024),
            pyramid: pyramid.into(),
            columns: 4,
        };
        assert!(matches!(request.render().outcome, Err(TileRenderError::LevelMissing { factor: 1024, .. })));
    }

    #[test]
    fn test_worker_renders_batch() {
        let _ = env_logger::builder().is_test(true).try_init();
        let pyramid: SharedPyramid = build_pyramid(ramp_waveform(4800, 10.0)).into();
        let mut worker = TileRenderWorker::spawn().unwrap();
        let batch: Vec<TileRenderRequest> = (0..4)
            .map(|i| TileRenderRequest {
                task: task("/a.wav", WaveformTile { index: i, start: f64::from(i) * 20.0, width: 20.0 }, 80.0, 2, 1),
                pyramid: Arc::clone(&pyramid),
                columns: 20,
            })
            .collect();
        worker.submit(batch).unwrap();

        let mut results = Vec::new();
        while results.len() < 4 {
            match worker.recv_timeout(Duration::from_secs(5)) {
                Some(result) => results.push(result),
                None => panic!("timed out waiting for tiles"),
            }
        }
        let indices: Vec<u32> = results.iter().map(|r| r.task.tile.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(results.iter().all(|r| r.outcome.as_ref().map(|p| p.columns.len()) == Ok(20)));

        worker.shutdown();
        assert!(!worker.is_running());
        assert!(matches!(worker.submit(Vec::new()), Ok(())));
    }
}
