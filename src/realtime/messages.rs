//! Realtime wire events
//!
//! Every message is a JSON envelope discriminated by its `type` field.
//!
//! Client events (sent):
//! - `session.update` - conversation instructions, voice, formats, turn detection
//! - `input_audio_buffer.append` - one captured frame, base64 PCM16
//!
//! Server events (handled):
//! - `response.audio.delta` - base64 PCM16 to play
//! - `response.text.delta` / `response.audio_transcript.delta` - transcript fragment
//! - `error` - remote error report
//!
//! Any other server event type is ignored.

use serde::{Deserialize, Serialize};

/// Wire name of the PCM16 format in both directions
pub const PCM16_FORMAT: &str = "pcm16";

/// Turn detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

/// Body of a `session.update` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub turn_detection: TurnDetection,
}

/// Events sent to the realtime service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionUpdate },

    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded PCM16 bytes
        audio: String,
    },
}

impl ClientEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Error details carried by an `error` event
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Events received from the realtime service
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    AudioDelta { delta: String },
    TextDelta { delta: String },
    Error(ErrorDetail),
    /// Any type this client does not handle
    Other { kind: String },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    error: Option<ErrorDetail>,
}

impl ServerEvent {
    /// Parse a raw text message
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(text)?;

        Ok(match envelope.kind.as_str() {
            "response.audio.delta" => match envelope.delta {
                Some(delta) if !delta.is_empty() => ServerEvent::AudioDelta { delta },
                _ => ServerEvent::Other {
                    kind: envelope.kind,
                },
            },
            "response.text.delta" | "response.audio_transcript.delta" => ServerEvent::TextDelta {
                delta: envelope.delta.unwrap_or_default(),
            },
            "error" => ServerEvent::Error(envelope.error.unwrap_or_default()),
            _ => ServerEvent::Other {
                kind: envelope.kind,
            },
        })
    }
}
