//! Shared playback context
//!
//! The output stream outlives a single capture graph so a quick stop/start
//! does not reopen the device. It is an explicitly owned, reference-counted
//! handle: clones share the same stream, and only [`OutputContext::ensure_ready`]
//! and [`OutputContext::teardown`] change whether a stream exists.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::AudioError;

/// Opens playback streams on an output device
#[async_trait]
pub trait OutputDevice: Send + Sync {
    async fn open(&self, sample_rate: u32) -> Result<Box<dyn OutputStream>, AudioError>;

    fn name(&self) -> &str;
}

/// A live playback stream
pub trait OutputStream: Send {
    /// Schedule samples for immediate playback
    fn play(&mut self, samples: &[f32]) -> Result<(), AudioError>;

    /// Resume a suspended stream
    fn resume(&mut self) -> Result<(), AudioError>;

    /// Release the device. Further `play` calls must be ignored.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Output device that drops everything (used when no speaker backend is compiled in)
pub struct DiscardOutput;

struct DiscardStream {
    closed: bool,
}

#[async_trait]
impl OutputDevice for DiscardOutput {
    async fn open(&self, _sample_rate: u32) -> Result<Box<dyn OutputStream>, AudioError> {
        Ok(Box::new(DiscardStream { closed: false }))
    }

    fn name(&self) -> &str {
        "discard"
    }
}

impl OutputStream for DiscardStream {
    fn play(&mut self, _samples: &[f32]) -> Result<(), AudioError> {
        Ok(())
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Reference-counted handle to the shared playback stream
#[derive(Clone)]
pub struct OutputContext {
    device: Arc<dyn OutputDevice>,
    sample_rate: u32,
    stream: Arc<Mutex<Option<Box<dyn OutputStream>>>>,
}

impl OutputContext {
    pub fn new(device: Arc<dyn OutputDevice>, sample_rate: u32) -> Self {
        Self {
            device,
            sample_rate,
            stream: Arc::new(Mutex::new(None)),
        }
    }

    /// Create the stream on first use (or after a close) and resume it
    ///
    /// The device is opened without holding the stream lock, so playback from
    /// other handles keeps going while a slow device comes up.
    pub async fn ensure_ready(&self) -> Result<(), AudioError> {
        if !self.is_ready() {
            info!(
                "Opening output stream on {} ({}Hz)",
                self.device.name(),
                self.sample_rate
            );
            let opened = self.device.open(self.sample_rate).await?;

            let mut guard = self.lock();
            match guard.as_ref() {
                Some(current) if !current.is_closed() => {
                    // Lost a race with another opener; keep theirs
                    let mut opened = opened;
                    opened.close();
                }
                _ => *guard = Some(opened),
            }
        }

        if let Some(stream) = self.lock().as_mut() {
            stream.resume()?;
        }

        Ok(())
    }

    /// Play a decoded frame. No-op when the stream is missing or closed.
    pub fn play(&self, samples: &[f32]) {
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(stream) if !stream.is_closed() => {
                if let Err(e) = stream.play(samples) {
                    warn!("Failed to schedule playback: {}", e);
                }
            }
            _ => debug!("Output closed, dropping {} samples", samples.len()),
        }
    }

    /// Release the stream
    pub fn teardown(&self) {
        if let Some(mut stream) = self.lock().take() {
            stream.close();
            info!("Output stream released");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.lock().as_ref().map_or(false, |s| !s.is_closed())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Box<dyn OutputStream>>> {
        // A panic while holding the lock leaves the stream usable
        self.stream.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
