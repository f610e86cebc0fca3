//! Batched waveform responses from the provider
//!
//! The provider answers a request for several files with one list of
//! `{filePath, data}` items. Paths coming back may differ from the local track
//! paths in separators or case, so matching goes through a normalizer.

use serde::Deserialize;

/// One entry of a batched waveform response
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveformBatchItem<T> {
    #[serde(default)]
    pub file_path: String,
    pub data: Option<T>,
}

/// Default path key: trimmed, forward slashes, lowercase
pub fn normalize_path_key(path: &str) -> String {
    path.trim().replace('\\', "/").to_lowercase()
}

/// Find the first item for `file_path` whose data decodes
///
/// Items are scanned in order; an item with a matching path but invalid data
/// is skipped so a later valid duplicate can still win.
pub fn find_batch_item<T, R, N, D>(
    items: &[WaveformBatchItem<T>],
    file_path: &str,
    normalize: N,
    decode: D,
) -> Option<R>
where
    N: Fn(&str) -> String,
    D: Fn(&T) -> Option<R>,
{
    let target = normalize(file_path);
    if target.is_empty() {
        return None;
    }
    items
        .iter()
        .filter(|item| normalize(&item.file_path) == target)
        .find_map(|item| item.data.as_ref().and_then(&decode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::decode::{decode_raw_waveform, RawWaveformPayload};
    use crate::waveform::mixxx::{decode_mixxx_waveform, MixxxWaveformPayload};

    #[test]
    fn test_lookup_tolerates_separator_and_case() {
        let json = r#"[
            {"filePath": "C:\\Music\\Other.wav", "data": {"min": [0.0], "max": [0.0]}},
            {"filePath": "c:/music/Track.WAV", "data": {"min": [-0.5, -0.25], "max": [0.5, 0.25]}}
        ]"#;
        let items: Vec<WaveformBatchItem<RawWaveformPayload>> = serde_json::from_str(json).unwrap();
        let found = find_batch_item(&items, "C:\\Music\\track.wav", normalize_path_key, decode_raw_waveform)
            .unwrap();
        assert_eq!(found.frames, 2);
    }

    #[test]
    fn test_lookup_skips_invalid_match() {
        let json = r#"[
            {"filePath": "/a.wav", "data": {"bands": {"low": {"left": [1], "right": [1]}}}},
            {"filePath": "/a.wav", "data": null},
            {"filePath": "/a.wav", "data": {"bands": {
                "low": {"left": [1], "right": [1]},
                "mid": {"left": [1], "right": [1]},
                "high": {"left": [1], "right": [1]},
                "all": {"left": [1], "right": [1]}
            }}}
        ]"#;
        let items: Vec<WaveformBatchItem<MixxxWaveformPayload>> = serde_json::from_str(json).unwrap();
        let found = find_batch_item(&items, "/a.wav", normalize_path_key, decode_mixxx_waveform);
        assert_eq!(found.map(|d| d.frames), Some(1));
        assert!(find_batch_item(&items, "/b.wav", normalize_path_key, decode_mixxx_waveform).is_none());
        assert!(find_batch_item(&items, "  ", normalize_path_key, decode_mixxx_waveform).is_none());
    }
}
