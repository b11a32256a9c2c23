use std::path::PathBuf;

use tokio::sync::mpsc;

use super::output::OutputDevice;
use crate::error::AudioError;

/// Wire sample rate for both directions
pub const SAMPLE_RATE: u32 = 24_000;

/// Samples per captured frame
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// A block of normalized mono samples
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Normalized samples in [-1, 1]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    pub fn duration_ms(&self) -> u64 {
        let per_channel = self.samples.len() as u64 / self.channels.max(1) as u64;
        per_channel * 1000 / self.sample_rate.max(1) as u64
    }
}

/// Constraints requested when opening the capture device
#[derive(Debug, Clone)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    /// Target sample rate (device audio is resampled if needed)
    pub sample_rate: u32,
    /// Target channel count (device audio is downmixed if needed)
    pub channels: u16,
    /// Samples per emitted frame
    pub block_size: usize,
    /// Frames buffered between the audio callback and the session
    pub queue_capacity: usize,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            sample_rate: SAMPLE_RATE,
            channels: 1,
            block_size: DEFAULT_BLOCK_SIZE,
            queue_capacity: 32,
        }
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - cpal: default input device (feature `backend-cpal`)
/// - File: replays a WAV file at real-time cadence
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a bounded receiver of fixed-size frames. The audio callback only
    /// enqueues; frames are dropped when the queue is full.
    async fn start(
        &mut self,
        constraints: &CaptureConstraints,
    ) -> Result<mpsc::Receiver<AudioFrame>, AudioError>;

    /// Stop capturing audio. No-op when already stopped.
    async fn stop(&mut self) -> Result<(), AudioError>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio source type
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Default microphone (requires `backend-cpal`)
    Microphone,
    /// WAV file replayed as if it were a microphone
    File(PathBuf),
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create a capture backend for the given source
    pub fn create_capture(source: AudioSource) -> Result<Box<dyn CaptureBackend>, AudioError> {
        match source {
            AudioSource::Microphone => {
                #[cfg(feature = "backend-cpal")]
                {
                    Ok(Box::new(super::cpal::CpalCapture::new()))
                }

                #[cfg(not(feature = "backend-cpal"))]
                {
                    Err(AudioError::DeviceUnavailable(
                        "microphone capture requires the backend-cpal feature".to_string(),
                    ))
                }
            }

            AudioSource::File(path) => Ok(Box::new(super::file::FileCapture::new(path))),
        }
    }

    /// Create the output device used for playback
    pub fn create_output() -> Box<dyn OutputDevice> {
        #[cfg(feature = "backend-cpal")]
        {
            Box::new(super::cpal::CpalOutputDevice)
        }

        #[cfg(not(feature = "backend-cpal"))]
        {
            Box::new(super::output::DiscardOutput)
        }
    }
}
