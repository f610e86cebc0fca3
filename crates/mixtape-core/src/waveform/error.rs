//! Waveform decode error types

use thiserror::Error;

/// Reasons a waveform payload is rejected
///
/// Callers of the `decode_*` helpers only see `None`; these variants exist so
/// the `try_decode_*` forms can say why when logging.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// A channel could not be resolved from its own field or the mono fallback
    #[error("missing waveform channel: {0}")]
    MissingChannel(&'static str),

    /// Text payload was not valid base64
    #[error("invalid base64 sample payload: {0}")]
    InvalidBase64(String),

    /// Binary view extends past the end of its backing buffer
    #[error("binary view out of bounds: offset {offset} + len {len} > {buffer_len}")]
    ViewOutOfBounds {
        offset: usize,
        len: usize,
        buffer_len: usize,
    },

    /// Band-structured payload lacks one of low/mid/high/all
    #[error("missing waveform band: {0}")]
    MissingBand(&'static str),

    /// Band-structured payload has no frames
    #[error("band waveform has no frames")]
    Empty,

    /// An array in a band-structured payload disagrees with the frame count
    #[error("band {band} {field} length {len} does not match frame count {frames}")]
    LengthMismatch {
        band: &'static str,
        field: &'static str,
        len: usize,
        frames: usize,
    },
}

/// Result type for waveform decoding
pub type DecodeResult<T> = Result<T, DecodeError>;
