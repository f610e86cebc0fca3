//! Undo stack for mixtape parameter edits
//!
//! Entries are full-state snapshots: undoing an envelope edit restores the
//! whole prior point list for that `(track, param)`, undoing a mute edit
//! restores the whole prior segment list. Edits owned by other subsystems
//! (e.g. a beat-grid editor) go on the same stack as [`ExternalCommand`]
//! values, reversed by a handler registered for the command's `kind`.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::envelope::{EnvelopeParam, GainPoint};
use crate::mute::MuteSegment;

/// Default number of entries kept before the oldest are dropped
pub const DEFAULT_UNDO_LIMIT: usize = 100;

/// Edit owned by a collaborator outside the mixtape core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalCommand {
    /// Handler key in the [`UndoHandlerRegistry`]
    pub kind: String,
    /// Whatever the handler needs to reverse the edit
    pub payload: serde_json::Value,
}

impl ExternalCommand {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// One undoable edit, holding the state to restore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MixParamUndoEntry {
    #[serde(rename_all = "camelCase")]
    Envelope {
        track_id: String,
        param: EnvelopeParam,
        points: Vec<GainPoint>,
    },
    #[serde(rename_all = "camelCase")]
    VolumeMute {
        track_id: String,
        segments: Vec<MuteSegment>,
    },
    External(ExternalCommand),
}

impl MixParamUndoEntry {
    /// Track the entry belongs to; external entries have none
    pub fn track_id(&self) -> Option<&str> {
        match self {
            MixParamUndoEntry::Envelope { track_id, .. } | MixParamUndoEntry::VolumeMute { track_id, .. } => {
                Some(track_id)
            }
            MixParamUndoEntry::External(_) => None,
        }
    }
}

/// Errors from applying an undo
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UndoError {
    #[error("nothing to undo")]
    Empty,

    #[error("mixtape is not editable")]
    NotEditable,

    /// The entry was consumed but no handler is registered for its kind
    #[error("no undo handler registered for external command '{0}'")]
    HandlerMissing(String),

    /// The entry was consumed but its handler reported failure
    #[error("undo handler for '{0}' did not apply the command")]
    HandlerDeclined(String),
}

pub type UndoResult<T> = Result<T, UndoError>;

// ============================================================================
// External handlers
// ============================================================================

/// Reverses external commands of one kind
///
/// Returns `true` when the command was applied.
pub trait ExternalUndoHandler: Send {
    fn undo(&mut self, command: &ExternalCommand) -> bool;
}

impl<F> ExternalUndoHandler for F
where
    F: FnMut(&ExternalCommand) -> bool + Send,
{
    fn undo(&mut self, command: &ExternalCommand) -> bool {
        self(command)
    }
}

/// Handlers for external commands keyed by `kind`
#[derive(Default)]
pub struct UndoHandlerRegistry {
    handlers: HashMap<String, Box<dyn ExternalUndoHandler>>,
}

impl std::fmt::Debug for UndoHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&String> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("UndoHandlerRegistry").field("kinds", &kinds).finish()
    }
}

impl UndoHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the same kind
    pub fn register<H>(&mut self, kind: impl Into<String>, handler: H)
    where
        H: ExternalUndoHandler + 'static,
    {
        let kind = kind.into();
        if self.handlers.insert(kind.clone(), Box::new(handler)).is_some() {
            log::debug!("UndoHandlerRegistry: replaced handler for '{}'", kind);
        }
    }

    pub fn unregister(&mut self, kind: &str) -> bool {
        self.handlers.remove(kind).is_some()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Run the handler for `command`
    pub fn apply(&mut self, command: &ExternalCommand) -> UndoResult<()> {
        let handler = self
            .handlers
            .get_mut(&command.kind)
            .ok_or_else(|| UndoError::HandlerMissing(command.kind.clone()))?;
        if handler.undo(command) {
            Ok(())
        } else {
            Err(UndoError::HandlerDeclined(command.kind.clone()))
        }
    }
}

// ============================================================================
// Stack
// ============================================================================

/// Bounded LIFO of undo entries (no redo)
#[derive(Debug, Clone)]
pub struct UndoStack {
    entries: VecDeque<MixParamUndoEntry>,
    limit: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LIMIT)
    }
}

impl UndoStack {
    /// Stack keeping at most `limit` entries (at least one)
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit.min(DEFAULT_UNDO_LIMIT)),
            limit,
        }
    }

    /// Push an entry, dropping the oldest past the limit
    pub fn push(&mut self, entry: MixParamUndoEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    pub fn pop(&mut self) -> Option<MixParamUndoEntry> {
        self.entries.pop_back()
    }

    /// Most recent entry without removing it
    pub fn peek(&self) -> Option<&MixParamUndoEntry> {
        self.entries.back()
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop every entry referring to one of `track_ids`
    pub fn forget_tracks(&mut self, track_ids: &[String]) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|entry| entry.track_id().map_or(true, |id| !track_ids.iter().any(|t| t == id)));
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn mute_entry(track_id: &str) -> MixParamUndoEntry {
        MixParamUndoEntry::VolumeMute {
            track_id: track_id.to_string(),
            segments: vec![MuteSegment::new(1.0, 2.0)],
        }
    }

    #[test]
    fn test_stack_is_lifo_and_bounded() {
        let mut stack = UndoStack::new(2);
        stack.push(mute_entry("a"));
        stack.push(mute_entry("b"));
        stack.push(mute_entry("c"));
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop().and_then(|e| e.track_id().map(str::to_string)), Some("c".into()));
        assert_eq!(stack.pop().and_then(|e| e.track_id().map(str::to_string)), Some("b".into()));
        assert!(stack.pop().is_none());
        assert_eq!(UndoStack::default().limit(), DEFAULT_UNDO_LIMIT);
        assert_eq!(UndoStack::new(0).limit(), 1);
    }

    #[test]
    fn test_forget_tracks_keeps_external() {
        let mut stack = UndoStack::default();
        stack.push(mute_entry("a"));
        stack.push(MixParamUndoEntry::External(ExternalCommand::new("grid", serde_json::Value::Null)));
        stack.push(mute_entry("b"));
        assert_eq!(stack.forget_tracks(&["a".to_string()]), 1);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.peek().and_then(MixParamUndoEntry::track_id), Some("b"));
    }

    #[test]
    fn test_registry_dispatch_by_kind() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = UndoHandlerRegistry::new();
        registry.register("beatGrid", move |cmd: &ExternalCommand| {
            counter.fetch_add(1, Ordering::SeqCst);
            cmd.payload.get("ok").and_then(serde_json::Value::as_bool).unwrap_or(false)
        });

        let ok = ExternalCommand::new("beatGrid", serde_json::json!({"ok": true}));
        let declined = ExternalCommand::new("beatGrid", serde_json::json!({}));
        let unknown = ExternalCommand::new("other", serde_json::Value::Null);

        assert_eq!(registry.apply(&ok), Ok(()));
        assert_eq!(registry.apply(&declined), Err(UndoError::HandlerDeclined("beatGrid".into())));
        assert_eq!(registry.apply(&unknown), Err(UndoError::HandlerMissing("other".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(registry.unregister("beatGrid"));
        assert!(!registry.contains("beatGrid"));
    }

    #[test]
    fn test_entry_serde_shape() {
        let entry = MixParamUndoEntry::Envelope {
            track_id: "t1".into(),
            param: EnvelopeParam::Volume,
            points: vec![GainPoint::new(0.0, 1.0)],
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "envelope");
        assert_eq!(json["trackId"], "t1");
        assert_eq!(json["param"], "volume");
        let back: MixParamUndoEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
