//! Mixtape Timeline - geometry and render scheduling for the mixtape view
//!
//! Everything here is a pure function of the track list, zoom and viewport,
//! except the [`TileScheduler`] which owns the per-session caches:
//!
//! - **Zoom**: clamping and the discrete render zoom levels
//! - **Layout**: per-track lane, offset and width; visible-range queries
//! - **Tiles**: fixed-width slices of a track and the pre-render plan
//! - **Grid**: beat/bar line geometry with zoom-dependent density
//! - **Render payload**: the per-frame instruction set for the renderer
//! - **Worker**: background tile rendering from pyramid levels
//!
//! # Data flow
//!
//! ```text
//! tracks + zoom ──> TimelineLayout ──> pre-render tasks ──> TileRenderWorker
//!                         │                                        │
//!                         ▼                                        ▼
//!               TimelineRenderPayload              TileScheduler::apply (version check)
//! ```

pub mod cache;
pub mod grid;
pub mod layout;
pub mod render;
pub mod scheduler;
pub mod tiles;
pub mod viewport;
pub mod worker;
pub mod zoom;

pub use cache::{TileCache, TileCacheKey};
pub use grid::{grid_bar_width, grid_density, grid_lines, GridDensity, GridLevel, GridLine};
pub use layout::{build_layout, track_width, LaneAssignment, TimelineLayout, TimelineTrackLayout};
pub use render::{
    build_render_payload, RenderFlags, RenderVersion, TimelineRenderPayload, TimelineRenderTrack,
    TimelineViewport,
};
pub use scheduler::{ApplyOutcome, SchedulerStats, TileScheduler};
pub use tiles::{
    plan_pre_render_tasks, pre_render_range, tile_at, tiles_for_width, tiles_in_range, PixelRange,
    TileKey, WaveformPreRenderTask, WaveformTile,
};
pub use viewport::{overview_scale, overview_viewport, pre_render_percent, OverviewViewport};
pub use worker::{render_tile, TilePeaks, TileRenderError, TileRenderRequest, TileRenderResult, TileRenderWorker};
pub use zoom::{
    buffer_id, clamp_zoom, quantize_render_zoom, render_px_per_sec, render_zoom_levels, zoom_bucket,
};
