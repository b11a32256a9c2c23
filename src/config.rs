use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::audio::{CaptureConstraints, DEFAULT_BLOCK_SIZE, SAMPLE_RATE};
use crate::realtime::messages::PCM16_FORMAT;
use crate::realtime::{SessionUpdate, TurnDetection};
use crate::session::SessionConfig;

pub const DEFAULT_INSTRUCTIONS: &str = "You are an improv comedy partner. Follow \"Yes, and...\" rules. \
Keep responses under 8 seconds. Be witty and engaging in your character work.";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub credential: CredentialConfig,
    pub realtime: RealtimeConfig,
    pub audio: AudioConfig,
    pub session: SessionTimeouts,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Token endpoint
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    pub url: String,
    pub model: String,
    pub voice: String,
    pub instructions: String,
    pub vad_threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub block_size: usize,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub frame_queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionTimeouts {
    pub connect_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "improv-scene".to_string(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/api/token".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "wss://api.openai.com/v1/realtime".to_string(),
            model: "gpt-4o-realtime-preview-2024-10-01".to_string(),
            voice: "alloy".to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            vad_threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: 1,
            block_size: DEFAULT_BLOCK_SIZE,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            frame_queue_capacity: 32,
        }
    }
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
        }
    }
}

impl Config {
    /// Load from an optional file plus `IMPROV__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("IMPROV")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            connect_timeout: Duration::from_secs(self.session.connect_timeout_secs),
            session_update: self.realtime.session_update(),
        }
    }

    pub fn capture_constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            echo_cancellation: self.audio.echo_cancellation,
            noise_suppression: self.audio.noise_suppression,
            auto_gain_control: self.audio.auto_gain_control,
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            block_size: self.audio.block_size,
            queue_capacity: self.audio.frame_queue_capacity,
        }
    }

    pub fn credential_timeout(&self) -> Duration {
        Duration::from_secs(self.credential.timeout_secs)
    }
}

impl RealtimeConfig {
    /// The `session.update` body sent once the channel connects
    pub fn session_update(&self) -> SessionUpdate {
        SessionUpdate {
            instructions: self.instructions.clone(),
            voice: self.voice.clone(),
            input_audio_format: PCM16_FORMAT.to_string(),
            output_audio_format: PCM16_FORMAT.to_string(),
            turn_detection: TurnDetection {
                kind: "server_vad".to_string(),
                threshold: self.vad_threshold,
                prefix_padding_ms: self.prefix_padding_ms,
                silence_duration_ms: self.silence_duration_ms,
            },
        }
    }
}
