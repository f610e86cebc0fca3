//! Raw min/max waveform decoding
//!
//! The waveform provider can hand over sample arrays in several shapes: a
//! float array, a view into a shared binary buffer, a plain byte blob, or a
//! base64 string (JSON transport). They are all resolved here, once, into
//! owned `Vec<f32>` channels so nothing downstream branches on the shape.

use std::sync::Arc;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::Deserialize;

use super::error::{DecodeError, DecodeResult};

/// Standard alphabet, padding optional (matches what browsers' `atob` accepts)
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// ============================================================================
// Sample payloads
// ============================================================================

/// One channel's samples as delivered by the provider
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "SampleWire")]
pub enum SamplePayload {
    /// Already-typed float samples
    TypedSamples(Vec<f32>),
    /// A byte range inside a shared buffer, reinterpreted as little-endian f32
    BinaryView {
        buffer: Arc<[u8]>,
        byte_offset: usize,
        byte_len: usize,
    },
    /// A whole byte blob, reinterpreted as little-endian f32
    RawBytes(Vec<u8>),
    /// Base64 text of little-endian f32 bytes
    EncodedText(String),
}

/// JSON transport shapes: a number array or a base64 string
#[derive(Deserialize)]
#[serde(untagged)]
enum SampleWire {
    Samples(Vec<f32>),
    Text(String),
}

impl From<SampleWire> for SamplePayload {
    fn from(wire: SampleWire) -> Self {
        match wire {
            SampleWire::Samples(samples) => SamplePayload::TypedSamples(samples),
            SampleWire::Text(text) => SamplePayload::EncodedText(text),
        }
    }
}

impl SamplePayload {
    /// Resolve into owned samples
    pub fn decode(&self) -> DecodeResult<Vec<f32>> {
        match self {
            SamplePayload::TypedSamples(samples) => Ok(samples.clone()),
            SamplePayload::BinaryView {
                buffer,
                byte_offset,
                byte_len,
            } => {
                let end = byte_offset
                    .checked_add(*byte_len)
                    .filter(|end| *end <= buffer.len())
                    .ok_or(DecodeError::ViewOutOfBounds {
                        offset: *byte_offset,
                        len: *byte_len,
                        buffer_len: buffer.len(),
                    })?;
                Ok(f32_from_le_bytes(&buffer[*byte_offset..end]))
            }
            SamplePayload::RawBytes(bytes) => Ok(f32_from_le_bytes(bytes)),
            SamplePayload::EncodedText(text) => {
                let bytes = decode_base64(text)?;
                Ok(f32_from_le_bytes(&bytes))
            }
        }
    }
}

/// Decode base64 text, ignoring ASCII whitespace
pub fn decode_base64(text: &str) -> DecodeResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    LENIENT_BASE64
        .decode(compact.as_bytes())
        .map_err(|e| DecodeError::InvalidBase64(e.to_string()))
}

/// Reinterpret bytes as little-endian f32, dropping a trailing partial sample
fn f32_from_le_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

// ============================================================================
// Raw waveform
// ============================================================================

/// Provider payload for a raw min/max waveform
///
/// `min`/`max` are the mono fallbacks used when a per-channel array is absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawWaveformPayload {
    pub duration: Option<f64>,
    pub sample_rate: Option<f64>,
    pub rate: Option<f64>,
    pub frames: Option<f64>,
    pub min_left: Option<SamplePayload>,
    pub max_left: Option<SamplePayload>,
    pub min_right: Option<SamplePayload>,
    pub max_right: Option<SamplePayload>,
    pub min: Option<SamplePayload>,
    pub max: Option<SamplePayload>,
}

/// Decoded min/max waveform for one file
///
/// Every channel holds at least `frames` values; `frames` is the usable length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawWaveformData {
    /// Track duration in seconds
    pub duration: f64,
    /// Source audio sample rate (Hz)
    pub sample_rate: f64,
    /// Frames per second of this buffer
    pub rate: f64,
    pub frames: usize,
    pub min_left: Vec<f32>,
    pub max_left: Vec<f32>,
    pub min_right: Vec<f32>,
    pub max_right: Vec<f32>,
}

impl RawWaveformData {
    /// True when there is nothing to draw
    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Seconds covered by one frame, or 0 when the rate is unknown
    pub fn seconds_per_frame(&self) -> f64 {
        if self.rate > 0.0 {
            1.0 / self.rate
        } else {
            0.0
        }
    }
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn resolve_channel(
    primary: Option<&SamplePayload>,
    mono: Option<&SamplePayload>,
    name: &'static str,
) -> DecodeResult<Vec<f32>> {
    primary
        .or(mono)
        .ok_or(DecodeError::MissingChannel(name))?
        .decode()
}

/// Decode a raw waveform payload, reporting why it failed
pub fn try_decode_raw_waveform(payload: &RawWaveformPayload) -> DecodeResult<RawWaveformData> {
    let min_left = resolve_channel(payload.min_left.as_ref(), payload.min.as_ref(), "minLeft")?;
    let max_left = resolve_channel(payload.max_left.as_ref(), payload.max.as_ref(), "maxLeft")?;
    let min_right = resolve_channel(payload.min_right.as_ref(), payload.min.as_ref(), "minRight")?;
    let max_right = resolve_channel(payload.max_right.as_ref(), payload.max.as_ref(), "maxRight")?;

    let available = min_left
        .len()
        .min(max_left.len())
        .min(min_right.len())
        .min(max_right.len());
    let frames = match payload.frames {
        Some(explicit) if explicit.is_finite() && explicit >= 1.0 => available.min(explicit as usize),
        _ => available,
    };

    Ok(RawWaveformData {
        duration: finite_or_zero(payload.duration),
        sample_rate: finite_or_zero(payload.sample_rate),
        rate: finite_or_zero(payload.rate),
        frames,
        min_left,
        max_left,
        min_right,
        max_right,
    })
}

/// Decode a raw waveform payload; failure means "no waveform for this track"
pub fn decode_raw_waveform(payload: &RawWaveformPayload) -> Option<RawWaveformData> {
    match try_decode_raw_waveform(payload) {
        Ok(data) => Some(data),
        Err(e) => {
            log::debug!("decode_raw_waveform: rejected payload: {}", e);
            None
        }
    }
}

/// Decode a raw waveform straight from a JSON value
pub fn decode_raw_waveform_json(value: &serde_json::Value) -> Option<RawWaveformData> {
    match RawWaveformPayload::deserialize(value) {
        Ok(payload) => decode_raw_waveform(&payload),
        Err(e) => {
            log::debug!("decode_raw_waveform_json: unexpected payload shape: {}", e);
            None
        }
    }
}
