//! Missing-track notification
//!
//! The file-existence collaborator reports paths whose backing file is gone.
//! The same removal set tends to be reported again on every rescan, so a
//! notice is only produced when the set differs from the previous one.

use serde::Serialize;

use crate::types::{file_name_of, normalize_unique_paths};

/// How many file names a notice lists before summarizing the rest
pub const MISSING_PREVIEW_LIMIT: usize = 6;

/// User-facing summary of one removal set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingTracksNotice {
    pub playlist_id: String,
    pub count: usize,
    /// First file names, at most `MISSING_PREVIEW_LIMIT`
    pub preview_names: Vec<String>,
    /// Files beyond the preview
    pub more_count: usize,
    /// Deduplicated paths, in report order
    pub paths: Vec<String>,
}

/// Suppresses identical consecutive removal reports
#[derive(Debug, Default)]
pub struct MissingTracksNotifier {
    last_signature: Option<String>,
}

/// Order-independent key for a removal set
pub fn removal_signature(playlist_id: &str, paths: &[String]) -> String {
    let mut sorted: Vec<&str> = paths.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    format!("{}::{}", playlist_id, sorted.join("|"))
}

impl MissingTracksNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a notice for `removed_paths`, or `None` when there is nothing
    /// new to tell (empty set or same set as last time)
    pub fn notify<S: AsRef<str>>(&mut self, playlist_id: &str, removed_paths: &[S]) -> Option<MissingTracksNotice> {
        let paths = normalize_unique_paths(removed_paths);
        if paths.is_empty() {
            return None;
        }
        let signature = removal_signature(playlist_id, &paths);
        if self.last_signature.as_deref() == Some(signature.as_str()) {
            log::debug!("notify: suppressed repeat of {} missing tracks", paths.len());
            return None;
        }
        self.last_signature = Some(signature);

        let preview_names: Vec<String> = paths
            .iter()
            .take(MISSING_PREVIEW_LIMIT)
            .map(|path| file_name_of(path).to_string())
            .collect();
        log::info!("notify: {} missing tracks in {}", paths.len(), playlist_id);
        Some(MissingTracksNotice {
            playlist_id: playlist_id.to_string(),
            count: paths.len(),
            more_count: paths.len() - preview_names.len(),
            preview_names,
            paths,
        })
    }

    /// Forget the last signature so the next report always notifies
    pub fn reset(&mut self) {
        self.last_signature = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_set_suppressed() {
        let mut notifier = MissingTracksNotifier::new();
        let notice = notifier.notify("p1", &["/m/b.wav", "/m/a.wav"]).unwrap();
        assert_eq!(notice.count, 2);
        assert_eq!(notice.preview_names, vec!["b.wav", "a.wav"]);

        // same set in another order and with duplicates
        assert!(notifier.notify("p1", &["/m/a.wav", " /m/b.wav", "/m/a.wav"]).is_none());
        // same paths in another playlist is a different set
        assert!(notifier.notify("p2", &["/m/a.wav", "/m/b.wav"]).is_some());
        assert!(notifier.notify("p1", &["/m/a.wav", "/m/b.wav"]).is_some());
    }

    #[test]
    fn test_empty_set_ignored() {
        let mut notifier = MissingTracksNotifier::new();
        assert!(notifier.notify::<&str>("p1", &[]).is_none());
        assert!(notifier.notify("p1", &["  ", ""]).is_none());
        notifier.notify("p1", &["/a.wav"]);
        notifier.reset();
        assert!(notifier.notify("p1", &["/a.wav"]).is_some());
    }

    #[test]
    fn test_preview_is_capped() {
        let paths: Vec<String> = (0..9).map(|i| format!("C:\\music\\t{}.wav", i)).collect();
        let notice = MissingTracksNotifier::new().notify("p", &paths).unwrap();
        assert_eq!(notice.preview_names.len(), MISSING_PREVIEW_LIMIT);
        assert_eq!(notice.preview_names[0], "t0.wav");
        assert_eq!(notice.more_count, 3);
    }
}
