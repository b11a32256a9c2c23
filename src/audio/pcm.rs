//! PCM16 codec
//!
//! Conversions between normalized `f32` frames and 16-bit little-endian wire
//! samples, and between raw sample buffers and the base64 text carried inside
//! JSON envelopes.
//!
//! Odd-length byte buffers are rejected with [`PcmError::OddLength`] rather than
//! silently dropping the trailing byte.

use base64::Engine;

use crate::error::PcmError;

/// Scale applied when quantizing a normalized sample
const ENCODE_SCALE: f32 = 32767.0;

/// Divisor applied when normalizing a wire sample
const DECODE_SCALE: f32 = 32768.0;

/// Quantize one normalized sample to PCM16
pub fn quantize(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * ENCODE_SCALE).round() as i16
}

/// Encode a frame of normalized samples as little-endian PCM16 bytes
pub fn encode_frame(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| quantize(s).to_le_bytes())
        .collect()
}

/// Decode little-endian PCM16 bytes into normalized samples
pub fn decode_frame(bytes: &[u8]) -> Result<Vec<f32>, PcmError> {
    if bytes.len() % 2 != 0 {
        return Err(PcmError::OddLength(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / DECODE_SCALE)
        .collect())
}

/// Encode bytes for transport inside a JSON envelope
pub fn to_transport_text(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode transport text back into bytes
pub fn from_transport_text(text: &str) -> Result<Vec<u8>, PcmError> {
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(|e| PcmError::InvalidTransportText(e.to_string()))
}

/// Encode a captured frame straight to the transport text used by `input_audio_buffer.append`
pub fn frame_to_transport(samples: &[f32]) -> String {
    to_transport_text(&encode_frame(samples))
}

/// Decode a `response.audio.delta` payload straight to playable samples
pub fn transport_to_frame(text: &str) -> Result<Vec<f32>, PcmError> {
    decode_frame(&from_transport_text(text)?)
}
