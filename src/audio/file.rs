use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{AudioFrame, CaptureBackend, CaptureConstraints};
use super::chunk::FrameAssembler;
use crate::error::AudioError;

/// Decoded WAV file with normalized samples
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples in [-1, 1]
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to read audio samples")?
            }
        };

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Convert to fixed-size mono frames at the target rate
    ///
    /// A trailing partial frame is padded with silence.
    pub fn to_frames(&self, target_rate: u32, block_size: usize) -> Vec<AudioFrame> {
        let mut assembler =
            FrameAssembler::new(self.sample_rate, self.channels, target_rate, block_size);
        let mut frames = assembler.push_interleaved(&self.samples);

        let pending = assembler.pending_len();
        if pending > 0 {
            let missing = (block_size - pending) as u64;
            let device_samples =
                (missing * self.sample_rate as u64).div_ceil(target_rate.max(1) as u64) as usize + 2;
            let silence = vec![0.0; device_samples * self.channels.max(1) as usize];
            let mut tail = assembler.push_interleaved(&silence);
            tail.truncate(1);
            frames.extend(tail);
        }

        frames
    }
}

/// Capture backend that replays a WAV file at real-time cadence
pub struct FileCapture {
    path: PathBuf,
    task: Option<JoinHandle<()>>,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FileCapture {
    async fn start(
        &mut self,
        constraints: &CaptureConstraints,
    ) -> Result<mpsc::Receiver<AudioFrame>, AudioError> {
        if self.is_capturing() {
            return Err(AudioError::AlreadyCapturing);
        }

        let audio = AudioFile::open(&self.path)
            .map_err(|e| AudioError::DeviceUnavailable(format!("{:#}", e)))?;
        let frames = audio.to_frames(constraints.sample_rate, constraints.block_size);
        let cadence = Duration::from_micros(
            constraints.block_size as u64 * 1_000_000 / constraints.sample_rate.max(1) as u64,
        );

        let (tx, rx) = mpsc::channel(constraints.queue_capacity.max(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence);
            for frame in frames {
                ticker.tick().await;
                if let Err(e) = tx.try_send(frame) {
                    match e {
                        mpsc::error::TrySendError::Full(_) => {
                            warn!("Capture queue full, dropping frame")
                        }
                        mpsc::error::TrySendError::Closed(_) => break,
                    }
                }
            }
            debug!("File capture reached end of input");
        });

        self.task = Some(task);
        info!("File capture started: {}", self.path.display());

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("File capture stopped");
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().map_or(false, |t| !t.is_finished())
    }

    fn name(&self) -> &str {
        "WAV file"
    }
}
