//! Waveform decoding and multi-resolution levels
//!
//! Two payload families arrive from the waveform provider:
//!
//! - **Raw min/max** (`RawWaveformPayload`): per-channel float min/max arrays,
//!   possibly as base64 text. Decoded into `RawWaveformData`.
//! - **Band-structured** (`MixxxWaveformPayload`): RGB band energy bytes with
//!   optional peaks. Validated into `MixxxWaveformData`.
//!
//! Both decoders fail closed: an inconsistent payload produces `None` and the
//! track simply has no waveform.
//!
//! Raw buffers feed the pyramid (`build_pyramid`, `PyramidCache`), which the
//! timeline queries with a samples-per-pixel ratio.

mod batch;
mod decode;
mod error;
mod mixxx;
mod pyramid;

pub use batch::{find_batch_item, normalize_path_key, WaveformBatchItem};
pub use decode::{
    decode_base64, decode_raw_waveform, decode_raw_waveform_json, try_decode_raw_waveform,
    RawWaveformData, RawWaveformPayload, SamplePayload,
};
pub use error::{DecodeError, DecodeResult};
pub use mixxx::{
    decode_mixxx_waveform, decode_mixxx_waveform_json, try_decode_mixxx_waveform, BytePayload,
    MixxxBandPayload, MixxxBandsPayload, MixxxWaveformBand, MixxxWaveformBands,
    MixxxWaveformData, MixxxWaveformPayload, MIXXX_MAX_RGB_ENERGY,
};
pub use pyramid::{
    build_pyramid, select_level, target_factor, ColumnPeaks, PyramidCache, RawWaveformLevel,
    SharedPyramid, MAX_PYRAMID_LEVELS, MAX_TARGET_FACTOR,
};
