use tokio::sync::mpsc;
use tracing::{error, info};

use super::backend::{AudioFrame, CaptureBackend, CaptureConstraints};
use super::output::OutputContext;
use crate::error::AudioError;

/// Connects a capture backend and the shared output context to the session
///
/// The capture graph lives for one session; the output context is handed in
/// at construction and may outlive it.
pub struct AudioBridge {
    capture: Box<dyn CaptureBackend>,
    output: OutputContext,
    constraints: CaptureConstraints,
}

impl AudioBridge {
    pub fn new(
        capture: Box<dyn CaptureBackend>,
        output: OutputContext,
        constraints: CaptureConstraints,
    ) -> Self {
        Self {
            capture,
            output,
            constraints,
        }
    }

    /// Open the capture device and start producing frames
    pub async fn start_capture(&mut self) -> Result<mpsc::Receiver<AudioFrame>, AudioError> {
        info!(
            "Starting capture on {} ({}Hz, {} ch, {} samples/frame)",
            self.capture.name(),
            self.constraints.sample_rate,
            self.constraints.channels,
            self.constraints.block_size
        );
        self.capture.start(&self.constraints).await
    }

    /// Stop the capture device. No-op when nothing is capturing.
    pub async fn stop_capture(&mut self) {
        if !self.capture.is_capturing() {
            return;
        }

        if let Err(e) = self.capture.stop().await {
            error!("Failed to stop capture: {}", e);
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_capturing()
    }

    pub async fn ensure_output_ready(&self) -> Result<(), AudioError> {
        self.output.ensure_ready().await
    }

    pub fn play_frame(&self, samples: &[f32]) {
        self.output.play(samples);
    }

    /// Release the shared output context
    pub fn teardown(&self) {
        self.output.teardown();
    }

    /// Handle used to play audio without holding the bridge
    pub fn output(&self) -> OutputContext {
        self.output.clone()
    }
}
