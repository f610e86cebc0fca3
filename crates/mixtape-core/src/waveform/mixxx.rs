//! Band-structured (Mixxx RGB) waveform buffers
//!
//! Each band (low, mid, high, all) stores one byte of energy per frame per
//! side, optionally with a separate peak byte. The buffer is only usable when
//! every array agrees on the frame count: one inconsistent array rejects the
//! whole payload rather than rendering from mismatched data.

use serde::Deserialize;

use super::decode::decode_base64;
use super::error::{DecodeError, DecodeResult};

/// Maximum combined RGB energy (`sqrt(255² × 3)`)
pub const MIXXX_MAX_RGB_ENERGY: f32 = 441.672_96;

// ============================================================================
// Wire format
// ============================================================================

/// Byte array as delivered by the provider: a number array or base64 text
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BytePayload {
    Bytes(Vec<u8>),
    EncodedText(String),
}

impl BytePayload {
    fn decode(&self) -> DecodeResult<Vec<u8>> {
        match self {
            BytePayload::Bytes(bytes) => Ok(bytes.clone()),
            BytePayload::EncodedText(text) => decode_base64(text),
        }
    }
}

/// One band as delivered by the provider
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MixxxBandPayload {
    pub left: Option<BytePayload>,
    pub right: Option<BytePayload>,
    pub peak_left: Option<BytePayload>,
    pub peak_right: Option<BytePayload>,
}

/// All four bands as delivered by the provider
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MixxxBandsPayload {
    pub low: Option<MixxxBandPayload>,
    pub mid: Option<MixxxBandPayload>,
    pub high: Option<MixxxBandPayload>,
    pub all: Option<MixxxBandPayload>,
}

/// Band-structured waveform as delivered by the provider
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MixxxWaveformPayload {
    pub duration: Option<f64>,
    pub sample_rate: Option<f64>,
    pub step: Option<f64>,
    pub bands: Option<MixxxBandsPayload>,
}

// ============================================================================
// Validated buffer
// ============================================================================

/// One validated band; `left.len() == right.len() ==` frame count
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MixxxWaveformBand {
    pub left: Vec<u8>,
    pub right: Vec<u8>,
    pub peak_left: Option<Vec<u8>>,
    pub peak_right: Option<Vec<u8>>,
}

impl MixxxWaveformBand {
    #[inline]
    fn left_at(&self, i: usize) -> f32 {
        self.peak_left.as_ref().map_or(self.left[i], |p| p[i]) as f32
    }

    #[inline]
    fn right_at(&self, i: usize) -> f32 {
        self.peak_right.as_ref().map_or(self.right[i], |p| p[i]) as f32
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MixxxWaveformBands {
    pub low: MixxxWaveformBand,
    pub mid: MixxxWaveformBand,
    pub high: MixxxWaveformBand,
    pub all: MixxxWaveformBand,
}

/// Validated band-structured waveform
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MixxxWaveformData {
    pub duration: f64,
    pub sample_rate: f64,
    /// Source samples per waveform frame
    pub step: f64,
    pub frames: usize,
    pub bands: MixxxWaveformBands,
}

impl MixxxWaveformData {
    /// Per-frame `(min, max)` amplitude derived from the RGB band energy
    ///
    /// Left energy maps to the positive half and right energy to the negative
    /// half, each normalized to `0..=1`.
    pub fn min_max_samples(&self) -> Vec<(f32, f32)> {
        let MixxxWaveformBands { low, mid, high, .. } = &self.bands;
        (0..self.frames)
            .map(|i| {
                let (l_low, l_mid, l_high) = (low.left_at(i), mid.left_at(i), high.left_at(i));
                let (r_low, r_mid, r_high) = (low.right_at(i), mid.right_at(i), high.right_at(i));
                let left = (l_low * l_low + l_mid * l_mid + l_high * l_high).sqrt();
                let right = (r_low * r_low + r_mid * r_mid + r_high * r_high).sqrt();
                let left_amp = (left / MIXXX_MAX_RGB_ENERGY).min(1.0);
                let right_amp = (right / MIXXX_MAX_RGB_ENERGY).min(1.0);
                (-right_amp, left_amp)
            })
            .collect()
    }
}

struct DecodedBand {
    name: &'static str,
    left: Vec<u8>,
    right: Vec<u8>,
    peak_left: Option<Vec<u8>>,
    peak_right: Option<Vec<u8>>,
}

fn decode_band(band: Option<&MixxxBandPayload>, name: &'static str) -> DecodeResult<DecodedBand> {
    let band = band.ok_or(DecodeError::MissingBand(name))?;
    let decode_opt = |payload: &Option<BytePayload>| payload.as_ref().map(BytePayload::decode).transpose();
    Ok(DecodedBand {
        name,
        left: decode_opt(&band.left)?.unwrap_or_default(),
        right: decode_opt(&band.right)?.unwrap_or_default(),
        peak_left: decode_opt(&band.peak_left)?,
        peak_right: decode_opt(&band.peak_right)?,
    })
}

fn check_len(band: &DecodedBand, field: &'static str, len: usize, frames: usize) -> DecodeResult<()> {
    if len == frames {
        Ok(())
    } else {
        Err(DecodeError::LengthMismatch {
            band: band.name,
            field,
            len,
            frames,
        })
    }
}

/// Validate a band-structured payload, reporting why it failed
pub fn try_decode_mixxx_waveform(payload: &MixxxWaveformPayload) -> DecodeResult<MixxxWaveformData> {
    let bands = payload.bands.as_ref().ok_or(DecodeError::MissingBand("bands"))?;
    let decoded = [
        decode_band(bands.low.as_ref(), "low")?,
        decode_band(bands.mid.as_ref(), "mid")?,
        decode_band(bands.high.as_ref(), "high")?,
        decode_band(bands.all.as_ref(), "all")?,
    ];

    let frames = decoded
        .iter()
        .flat_map(|band| [band.left.len(), band.right.len()])
        .min()
        .unwrap_or(0);
    if frames == 0 {
        return Err(DecodeError::Empty);
    }

    for band in &decoded {
        check_len(band, "left", band.left.len(), frames)?;
        check_len(band, "right", band.right.len(), frames)?;
        if let Some(peak) = &band.peak_left {
            check_len(band, "peakLeft", peak.len(), frames)?;
        }
        if let Some(peak) = &band.peak_right {
            check_len(band, "peakRight", peak.len(), frames)?;
        }
    }

    let [low, mid, high, all] = decoded.map(|band| MixxxWaveformBand {
        left: band.left,
        right: band.right,
        peak_left: band.peak_left,
        peak_right: band.peak_right,
    });

    let finite = |v: Option<f64>| v.filter(|v| v.is_finite()).unwrap_or(0.0);
    Ok(MixxxWaveformData {
        duration: finite(payload.duration),
        sample_rate: finite(payload.sample_rate),
        step: finite(payload.step),
        frames,
        bands: MixxxWaveformBands { low, mid, high, all },
    })
}

/// Validate a band-structured payload; any inconsistency yields `None`
pub fn decode_mixxx_waveform(payload: &MixxxWaveformPayload) -> Option<MixxxWaveformData> {
    match try_decode_mixxx_waveform(payload) {
        Ok(data) => Some(data),
        Err(e) => {
            log::debug!("decode_mixxx_waveform: rejected payload: {}", e);
            None
        }
    }
}

/// Validate a band-structured payload straight from a JSON value
pub fn decode_mixxx_waveform_json(value: &serde_json::Value) -> Option<MixxxWaveformData> {
    match MixxxWaveformPayload::deserialize(value) {
        Ok(payload) => decode_mixxx_waveform(&payload),
        Err(e) => {
            log::debug!("decode_mixxx_waveform_json: unexpected payload shape: {}", e);
            None
        }
    }
}
