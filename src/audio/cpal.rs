//! Microphone capture and speaker playback using cpal
//!
//! `cpal::Stream` is `!Send`, so each stream is built and owned by a dedicated
//! thread that lives until it receives a stop/close command.

use std::collections::VecDeque;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::backend::{AudioFrame, CaptureBackend, CaptureConstraints};
use super::chunk::{FrameAssembler, LinearResampler};
use super::output::{OutputDevice, OutputStream};
use crate::error::AudioError;

fn map_build_error(err: cpal::BuildStreamError) -> AudioError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => {
            AudioError::DeviceUnavailable("input device not available".to_string())
        }
        other => AudioError::Stream(other.to_string()),
    }
}

fn build_input<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut assembler: FrameAssembler,
    frames_tx: mpsc::Sender<AudioFrame>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                scratch.clear();
                scratch.extend(data.iter().map(|&s| f32::from_sample(s)));

                for frame in assembler.push_interleaved(&scratch) {
                    match frames_tx.try_send(frame) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            debug!("Capture queue full, dropping frame")
                        }
                        // Session already stopped
                        Err(mpsc::error::TrySendError::Closed(_)) => return,
                    }
                }
            },
            |err| error!("Audio input stream error: {}", err),
            None,
        )
        .map_err(map_build_error)
}

/// Handle to the thread that owns a capture stream
struct CaptureThread {
    stop_tx: std_mpsc::Sender<()>,
    thread: Option<JoinHandle<()>>,
}

/// Default-input-device capture
pub struct CpalCapture {
    running: Option<CaptureThread>,
}

impl CpalCapture {
    pub fn new() -> Self {
        Self { running: None }
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CaptureBackend for CpalCapture {
    async fn start(
        &mut self,
        constraints: &CaptureConstraints,
    ) -> Result<mpsc::Receiver<AudioFrame>, AudioError> {
        if self.running.is_some() {
            return Err(AudioError::AlreadyCapturing);
        }

        // cpal exposes no voice-processing switches; these come from the OS input chain
        debug!(
            "Requested echo_cancellation={}, noise_suppression={}, auto_gain_control={}",
            constraints.echo_cancellation,
            constraints.noise_suppression,
            constraints.auto_gain_control
        );

        let (frames_tx, frames_rx) = mpsc::channel(constraints.queue_capacity.max(1));
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel::<Result<(), AudioError>>();
        let constraints = constraints.clone();

        let thread = std::thread::spawn(move || {
            let host = cpal::default_host();
            let Some(device) = host.default_input_device() else {
                let _ = ready_tx.send(Err(AudioError::DeviceUnavailable(
                    "no input device".to_string(),
                )));
                return;
            };

            let supported = match device.default_input_config() {
                Ok(c) => c,
                Err(e) => {
                    let _ = ready_tx.send(Err(AudioError::DeviceUnavailable(e.to_string())));
                    return;
                }
            };

            let config: StreamConfig = supported.config();
            info!(
                "Input device {} ({}Hz, {} ch, {:?})",
                device.name().unwrap_or_default(),
                config.sample_rate.0,
                config.channels,
                supported.sample_format()
            );

            let assembler = FrameAssembler::new(
                config.sample_rate.0,
                config.channels,
                constraints.sample_rate,
                constraints.block_size,
            );

            let stream = match supported.sample_format() {
                SampleFormat::F32 => build_input::<f32>(&device, &config, assembler, frames_tx),
                SampleFormat::I16 => build_input::<i16>(&device, &config, assembler, frames_tx),
                SampleFormat::U16 => build_input::<u16>(&device, &config, assembler, frames_tx),
                SampleFormat::I32 => build_input::<i32>(&device, &config, assembler, frames_tx),
                other => Err(AudioError::Stream(format!(
                    "unsupported sample format: {:?}",
                    other
                ))),
            };

            let stream = match stream.and_then(|s| {
                s.play().map_err(|e| AudioError::Stream(e.to_string()))?;
                Ok(s)
            }) {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            let _ = ready_tx.send(Ok(()));
            let _ = stop_rx.recv();
            drop(stream);
            info!("Capture thread exiting");
        });

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(AudioError::Stream("capture thread exited".to_string())),
        }

        self.running = Some(CaptureThread {
            stop_tx,
            thread: Some(thread),
        });
        info!("Microphone capture started");

        Ok(frames_rx)
    }

    async fn stop(&mut self) -> Result<(), AudioError> {
        let Some(mut running) = self.running.take() else {
            return Ok(());
        };

        let _ = running.stop_tx.send(());
        if let Some(thread) = running.thread.take() {
            tokio::task::spawn_blocking(move || thread.join())
                .await
                .map_err(|e| AudioError::Stream(e.to_string()))?
                .map_err(|_| AudioError::Stream("capture thread panicked".to_string()))?;
        }

        info!("Microphone capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.running.is_some()
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

enum OutputCommand {
    Resume,
    Close,
}

/// Default-output-device playback
pub struct CpalOutputDevice;

#[async_trait]
impl OutputDevice for CpalOutputDevice {
    async fn open(&self, sample_rate: u32) -> Result<Box<dyn OutputStream>, AudioError> {
        let queue: Arc<Mutex<VecDeque<f32>>> = Arc::new(Mutex::new(VecDeque::new()));
        let (command_tx, command_rx) = std_mpsc::channel::<OutputCommand>();
        let (ready_tx, ready_rx) =
            tokio::sync::oneshot::channel::<Result<(u32, u16), AudioError>>();

        let callback_queue = Arc::clone(&queue);
        std::thread::spawn(move || {
            let host = cpal::default_host();
            let Some(device) = host.default_output_device() else {
                let _ = ready_tx.send(Err(AudioError::DeviceUnavailable(
                    "no output device".to_string(),
                )));
                return;
            };

            let config: StreamConfig = match device.default_output_config() {
                Ok(c) if c.sample_format() == SampleFormat::F32 => c.config(),
                Ok(c) => {
                    let _ = ready_tx.send(Err(AudioError::Stream(format!(
                        "unsupported output format: {:?}",
                        c.sample_format()
                    ))));
                    return;
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(AudioError::DeviceUnavailable(e.to_string())));
                    return;
                }
            };

            let stream = device.build_output_stream(
                &config,
                move |output: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Never block the audio thread; play silence on contention
                    match callback_queue.try_lock() {
                        Ok(mut queue) => {
                            for sample in output.iter_mut() {
                                *sample = queue.pop_front().unwrap_or(0.0);
                            }
                        }
                        Err(_) => output.fill(0.0),
                    }
                },
                |err| error!("Audio output stream error: {}", err),
                None,
            );

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(AudioError::Stream(e.to_string())));
                    return;
                }
            };

            let _ = ready_tx.send(Ok((config.sample_rate.0, config.channels)));

            for command in command_rx {
                match command {
                    OutputCommand::Resume => {
                        if let Err(e) = stream.play() {
                            warn!("Failed to resume output stream: {}", e);
                        }
                    }
                    OutputCommand::Close => break,
                }
            }
            info!("Output thread exiting");
        });

        let (device_rate, device_channels) = ready_rx
            .await
            .map_err(|_| AudioError::Stream("output thread exited".to_string()))??;

        Ok(Box::new(CpalOutputStream {
            queue,
            command_tx,
            resampler: LinearResampler::new(sample_rate, device_rate),
            device_channels,
            closed: false,
        }))
    }

    fn name(&self) -> &str {
        "cpal speaker"
    }
}

struct CpalOutputStream {
    queue: Arc<Mutex<VecDeque<f32>>>,
    command_tx: std_mpsc::Sender<OutputCommand>,
    resampler: LinearResampler,
    device_channels: u16,
    closed: bool,
}

impl OutputStream for CpalOutputStream {
    fn play(&mut self, samples: &[f32]) -> Result<(), AudioError> {
        if self.closed {
            return Ok(());
        }

        let resampled = self.resampler.process(samples);
        let mut queue = self
            .queue
            .lock()
            .map_err(|_| AudioError::Stream("playback queue poisoned".to_string()))?;
        for sample in resampled {
            for _ in 0..self.device_channels.max(1) {
                queue.push_back(sample);
            }
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.command_tx
            .send(OutputCommand::Resume)
            .map_err(|_| AudioError::Stream("output thread exited".to_string()))
    }

    fn close(&mut self) {
        if !self.closed {
            let _ = self.command_tx.send(OutputCommand::Close);
            self.closed = true;
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for CpalOutputStream {
    fn drop(&mut self) {
        self.close();
    }
}
