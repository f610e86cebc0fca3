//! Edit session for one open mixtape
//!
//! Owns the track list plus the per-track automation state (envelopes and
//! mute segments) and the undo stack over both. Every mutation:
//!
//! 1. checks the host's [`EditCapability`] and is a no-op when not editable
//! 2. computes the replacement sequence with the pure helpers in
//!    [`crate::envelope`] / [`crate::mute`]
//! 3. pushes the prior full sequence onto the undo stack, only if the
//!    sequence actually changed
//!
//! All of this runs synchronously on the interaction thread.

use std::collections::HashMap;

use crate::envelope::{self, EnvelopeParam, GainPoint, RawGainPoint};
use crate::mute::{self, MuteSegment, RawMuteSegment};
use crate::types::{sort_by_mix_order, MixtapeTrack};
use crate::undo::{
    ExternalCommand, ExternalUndoHandler, MixParamUndoEntry, UndoError, UndoHandlerRegistry, UndoResult,
    UndoStack, DEFAULT_UNDO_LIMIT,
};

// ============================================================================
// Editability
// ============================================================================

/// Host-provided capability deciding whether the mixtape may be edited
pub trait EditCapability: Send {
    fn is_editable(&self) -> bool;
}

impl<F> EditCapability for F
where
    F: Fn() -> bool + Send,
{
    fn is_editable(&self) -> bool {
        self()
    }
}

/// Capability that always allows edits
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysEditable;

impl EditCapability for AlwaysEditable {
    fn is_editable(&self) -> bool {
        true
    }
}

/// What an undo restored
#[derive(Debug, Clone, PartialEq)]
pub enum UndoApplied {
    Envelope { track_id: String, param: EnvelopeParam },
    VolumeMute { track_id: String },
    External { kind: String },
}

// ============================================================================
// Session
// ============================================================================

pub struct MixtapeSession {
    tracks: Vec<MixtapeTrack>,
    /// Decoded waveform durations, preferred over the display string
    durations: HashMap<String, f64>,
    envelopes: HashMap<(String, EnvelopeParam), Vec<GainPoint>>,
    mute_segments: HashMap<String, Vec<MuteSegment>>,
    undo: UndoStack,
    handlers: UndoHandlerRegistry,
    capability: Box<dyn EditCapability>,
    /// Bumped whenever the set of tracks changes
    track_revision: u64,
}

impl std::fmt::Debug for MixtapeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixtapeSession")
            .field("tracks", &self.tracks.len())
            .field("envelopes", &self.envelopes.len())
            .field("mute_segments", &self.mute_segments.len())
            .field("undo", &self.undo.len())
            .field("track_revision", &self.track_revision)
            .finish()
    }
}

impl MixtapeSession {
    pub fn new(tracks: Vec<MixtapeTrack>, capability: impl EditCapability + 'static) -> Self {
        Self::with_undo_limit(tracks, capability, DEFAULT_UNDO_LIMIT)
    }

    pub fn with_undo_limit(
        mut tracks: Vec<MixtapeTrack>,
        capability: impl EditCapability + 'static,
        undo_limit: usize,
    ) -> Self {
        sort_by_mix_order(&mut tracks);
        log::info!("MixtapeSession: opened with {} tracks", tracks.len());
        Self {
            tracks,
            durations: HashMap::new(),
            envelopes: HashMap::new(),
            mute_segments: HashMap::new(),
            undo: UndoStack::new(undo_limit),
            handlers: UndoHandlerRegistry::new(),
            capability: Box::new(capability),
            track_revision: 0,
        }
    }

    pub fn is_editable(&self) -> bool {
        self.capability.is_editable()
    }

    /// Tracks in `mix_order`
    pub fn tracks(&self) -> &[MixtapeTrack] {
        &self.tracks
    }

    pub fn track(&self, track_id: &str) -> Option<&MixtapeTrack> {
        self.tracks.iter().find(|track| track.id == track_id)
    }

    fn has_track(&self, track_id: &str) -> bool {
        self.track(track_id).is_some()
    }

    pub fn track_revision(&self) -> u64 {
        self.track_revision
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    /// Replace the whole track list; automation of tracks no longer present is dropped
    pub fn set_tracks(&mut self, mut tracks: Vec<MixtapeTrack>) {
        sort_by_mix_order(&mut tracks);
        let removed: Vec<String> = self
            .tracks
            .iter()
            .filter(|old| !tracks.iter().any(|new| new.id == old.id))
            .map(|old| old.id.clone())
            .collect();
        self.tracks = tracks;
        self.forget_track_state(&removed);
        self.track_revision += 1;
    }

    /// Point a track at a moved file
    pub fn repoint_track(&mut self, track_id: &str, new_path: &str) -> bool {
        let Some(track) = self.tracks.iter_mut().find(|track| track.id == track_id) else {
            return false;
        };
        track.repoint(new_path);
        self.track_revision += 1;
        true
    }

    /// Record a decoded waveform's duration for a track
    pub fn set_track_duration(&mut self, track_id: &str, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            self.durations.insert(track_id.to_string(), seconds);
        }
    }

    /// Best known duration: decoded waveform first, then the display string
    pub fn track_duration(&self, track_id: &str) -> Option<f64> {
        if let Some(seconds) = self.durations.get(track_id) {
            return Some(*seconds);
        }
        self.track(track_id)
            .map(MixtapeTrack::duration_seconds)
            .filter(|seconds| *seconds > 0.0)
    }

    fn forget_track_state(&mut self, track_ids: &[String]) {
        if track_ids.is_empty() {
            return;
        }
        self.envelopes.retain(|(id, _), _| !track_ids.contains(id));
        self.mute_segments.retain(|id, _| !track_ids.contains(id));
        self.durations.retain(|id, _| !track_ids.contains(id));
        let dropped = self.undo.forget_tracks(track_ids);
        log::debug!(
            "forget_track_state: {} tracks, {} undo entries dropped",
            track_ids.len(),
            dropped
        );
    }

    /// Remove tracks whose file is missing, with all their automation state
    ///
    /// Paths are compared after trimming. Returns the removed tracks.
    pub fn purge_missing<S: AsRef<str>>(&mut self, missing_paths: &[S]) -> Vec<MixtapeTrack> {
        let paths = crate::types::normalize_unique_paths(missing_paths);
        if paths.is_empty() {
            return Vec::new();
        }
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tracks)
            .into_iter()
            .partition(|track| paths.iter().any(|p| p == track.file_path.trim()));
        self.tracks = kept;
        if removed.is_empty() {
            return removed;
        }
        let ids: Vec<String> = removed.iter().map(|track| track.id.clone()).collect();
        self.forget_track_state(&ids);
        self.track_revision += 1;
        log::info!("purge_missing: removed {} tracks", removed.len());
        removed
    }

    // ========================================================================
    // Envelopes
    // ========================================================================

    /// Current points for `(track, param)`, or a flat default when none are stored
    pub fn envelope(&self, track_id: &str, param: EnvelopeParam) -> Vec<GainPoint> {
        match self.envelopes.get(&(track_id.to_string(), param)) {
            Some(points) => points.clone(),
            None => envelope::normalize_envelope_points(
                param,
                Vec::<RawGainPoint>::new(),
                self.track_duration(track_id),
            ),
        }
    }

    /// Load persisted points without recording undo
    pub fn load_envelope<I>(&mut self, track_id: &str, param: EnvelopeParam, raw: I)
    where
        I: IntoIterator,
        I::Item: Into<RawGainPoint>,
    {
        let points = envelope::normalize_envelope_points(param, raw, self.track_duration(track_id));
        self.envelopes.insert((track_id.to_string(), param), points);
    }

    /// Replace the points for `(track, param)`; returns whether anything changed
    pub fn set_envelope<I>(&mut self, track_id: &str, param: EnvelopeParam, raw: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<RawGainPoint>,
    {
        if !self.is_editable() || !self.has_track(track_id) {
            return false;
        }
        let next = envelope::normalize_envelope_points(param, raw, self.track_duration(track_id));
        self.replace_envelope(track_id, param, next)
    }

    fn replace_envelope(&mut self, track_id: &str, param: EnvelopeParam, next: Vec<GainPoint>) -> bool {
        let prior = self.envelope(track_id, param);
        if prior == next {
            return false;
        }
        self.undo.push(MixParamUndoEntry::Envelope {
            track_id: track_id.to_string(),
            param,
            points: prior,
        });
        self.envelopes.insert((track_id.to_string(), param), next);
        true
    }

    fn editable_envelope(&self, track_id: &str, param: EnvelopeParam) -> Option<(Vec<GainPoint>, f64)> {
        if !self.is_editable() {
            return None;
        }
        let duration = self.track_duration(track_id)?;
        Some((self.envelope(track_id, param), duration))
    }

    /// Add a point (or retarget a nearby one); returns the affected index
    pub fn insert_envelope_point(
        &mut self,
        track_id: &str,
        param: EnvelopeParam,
        sec: f64,
        gain: f64,
    ) -> Option<usize> {
        let (points, duration) = self.editable_envelope(track_id, param)?;
        let (next, index) = envelope::insert_point(param, &points, sec, gain, duration);
        self.replace_envelope(track_id, param, next);
        Some(index)
    }

    pub fn move_envelope_point(
        &mut self,
        track_id: &str,
        param: EnvelopeParam,
        index: usize,
        sec: f64,
        gain: f64,
    ) -> bool {
        let Some((points, duration)) = self.editable_envelope(track_id, param) else {
            return false;
        };
        let next = envelope::move_point(param, &points, index, sec, gain, duration);
        self.replace_envelope(track_id, param, next)
    }

    pub fn delete_envelope_point(&mut self, track_id: &str, param: EnvelopeParam, index: usize) -> bool {
        let Some((points, _)) = self.editable_envelope(track_id, param) else {
            return false;
        };
        let next = envelope::delete_point(&points, index);
        self.replace_envelope(track_id, param, next)
    }

    /// Sampled gain for `(track, param)` at `sec`
    pub fn sample_envelope(&self, track_id: &str, param: EnvelopeParam, sec: f64) -> f64 {
        let points = self.envelope(track_id, param);
        envelope::sample_envelope_at(param, &points, sec, param.config().default_gain)
    }

    // ========================================================================
    // Mute segments
    // ========================================================================

    pub fn mute_segments(&self, track_id: &str) -> &[MuteSegment] {
        self.mute_segments.get(track_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_muted_at(&self, track_id: &str, sec: f64) -> bool {
        mute::is_muted_at(self.mute_segments(track_id), sec)
    }

    /// Load persisted segments without recording undo
    pub fn load_mute_segments<I>(&mut self, track_id: &str, raw: I)
    where
        I: IntoIterator,
        I::Item: Into<RawMuteSegment>,
    {
        let segments = mute::normalize_segments(raw, self.track_duration(track_id));
        self.store_mute_segments(track_id, segments);
    }

    fn store_mute_segments(&mut self, track_id: &str, segments: Vec<MuteSegment>) {
        if segments.is_empty() {
            self.mute_segments.remove(track_id);
        } else {
            self.mute_segments.insert(track_id.to_string(), segments);
        }
    }

    fn replace_mute_segments(&mut self, track_id: &str, next: Vec<MuteSegment>) -> bool {
        let prior = self.mute_segments(track_id).to_vec();
        if prior == next {
            return false;
        }
        self.undo.push(MixParamUndoEntry::VolumeMute {
            track_id: track_id.to_string(),
            segments: prior,
        });
        self.store_mute_segments(track_id, next);
        true
    }

    fn mute_edit<F>(&mut self, track_id: &str, edit: F) -> bool
    where
        F: FnOnce(&[MuteSegment], Option<f64>) -> Vec<MuteSegment>,
    {
        if !self.is_editable() || !self.has_track(track_id) {
            return false;
        }
        let next = edit(self.mute_segments(track_id), self.track_duration(track_id));
        self.replace_mute_segments(track_id, next)
    }

    /// Replace a track's mute segments; returns whether anything changed
    pub fn set_mute_segments<I>(&mut self, track_id: &str, raw: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<RawMuteSegment>,
    {
        self.mute_edit(track_id, |_, duration| mute::normalize_segments(raw, duration))
    }

    pub fn add_mute_range(&mut self, track_id: &str, start: f64, end: f64) -> bool {
        self.mute_edit(track_id, |current, duration| {
            mute::add_mute_range(current, start, end, duration)
        })
    }

    pub fn remove_mute_range(&mut self, track_id: &str, start: f64, end: f64) -> bool {
        self.mute_edit(track_id, |current, duration| {
            mute::remove_mute_range(current, start, end, duration)
        })
    }

    pub fn toggle_mute_at(&mut self, track_id: &str, start: f64, end: f64) -> bool {
        self.mute_edit(track_id, |current, duration| {
            mute::toggle_mute_at(current, start, end, duration)
        })
    }

    // ========================================================================
    // Undo
    // ========================================================================

    pub fn register_undo_handler<H>(&mut self, kind: impl Into<String>, handler: H)
    where
        H: ExternalUndoHandler + 'static,
    {
        self.handlers.register(kind, handler);
    }

    /// Record an edit made by an external collaborator
    pub fn push_external(&mut self, command: ExternalCommand) -> bool {
        if !self.is_editable() {
            return false;
        }
        self.undo.push(MixParamUndoEntry::External(command));
        true
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    /// Restore the most recent entry
    ///
    /// An external entry is consumed even when its handler is missing or
    /// declines; the error reports that it was not applied.
    pub fn undo(&mut self) -> UndoResult<UndoApplied> {
        if !self.is_editable() {
            return Err(UndoError::NotEditable);
        }
        let entry = self.undo.pop().ok_or(UndoError::Empty)?;
        match entry {
            MixParamUndoEntry::Envelope {
                track_id,
                param,
                points,
            } => {
                log::debug!("undo: envelope {} {}", track_id, param);
                self.envelopes.insert((track_id.clone(), param), points);
                Ok(UndoApplied::Envelope { track_id, param })
            }
            MixParamUndoEntry::VolumeMute { track_id, segments } => {
                log::debug!("undo: volume mute {}", track_id);
                self.store_mute_segments(&track_id, segments);
                Ok(UndoApplied::VolumeMute { track_id })
            }
            MixParamUndoEntry::External(command) => match self.handlers.apply(&command) {
                Ok(()) => Ok(UndoApplied::External { kind: command.kind }),
                Err(e) => {
                    log::warn!("undo: {}", e);
                    Err(e)
                }
            },
        }
    }
}
