//! Mixtape Core - Shared library for the mixtape timeline
//!
//! This crate holds everything in the mixtape editor that is not geometry:
//!
//! - **Data model**: tracks derived from the persisted `MixtapeRawItem` records
//! - **Waveform decoding**: raw min/max buffers and Mixxx-style band buffers
//! - **Waveform pyramid**: per-file multi-resolution min/max levels with a shared cache
//! - **Mute segments**: canonical sorted, non-overlapping mute ranges per track
//! - **Gain envelopes**: piecewise-linear automation per track and parameter
//! - **Undo**: one LIFO stack across envelope, mute and external edits
//! - **Session**: the editable mixtape state that ties the above together
//! - **Services**: missing-track notices and a debounced refresh thread
//!
//! Layout, tiles and render scheduling live in `mixtape-timeline`.

pub mod config;
pub mod debounce;
pub mod envelope;
pub mod missing;
pub mod mute;
pub mod session;
pub mod types;
pub mod undo;
pub mod waveform;
pub mod worker;

pub use types::*;

pub use config::{MixtapeConfig, TimelineConfig};
pub use envelope::{EnvelopeParam, GainPoint};
pub use mute::MuteSegment;
pub use session::{AlwaysEditable, EditCapability, MixtapeSession, UndoApplied};
pub use undo::{ExternalCommand, MixParamUndoEntry, UndoError};
pub use waveform::{RawWaveformData, RawWaveformLevel};
pub use worker::WorkerError;
