// Unit tests for audio backend abstractions
//
// These tests verify the frame types, capture constraints, backend factory and
// the shared output context.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use common::{MockCapture, MockOutput};
use improv_scene::audio::{
    AudioBackendFactory, AudioBridge, AudioFrame, AudioSource, CaptureConstraints, DiscardOutput,
    OutputContext, OutputDevice, OutputStream, DEFAULT_BLOCK_SIZE, SAMPLE_RATE,
};
use improv_scene::AudioError;

/// Output device that never finishes opening
struct StalledOutput;

#[async_trait::async_trait]
impl OutputDevice for StalledOutput {
    async fn open(&self, _sample_rate: u32) -> Result<Box<dyn OutputStream>, AudioError> {
        std::future::pending().await
    }

    fn name(&self) -> &str {
        "stalled"
    }
}

#[test]
fn test_audio_frame_creation() {
    let frame = AudioFrame {
        samples: vec![0.1, -0.2, 0.3],
        sample_rate: 24000,
        channels: 1,
        timestamp_ms: 1000,
    };

    assert_eq!(frame.samples.len(), 3);
    assert_eq!(frame.sample_rate, 24000);
    assert_eq!(frame.channels, 1);
    assert_eq!(frame.timestamp_ms, 1000);
}

#[test]
fn test_audio_frame_duration() {
    // One default block at the wire rate is about 170ms
    let frame = AudioFrame {
        samples: vec![0.0; DEFAULT_BLOCK_SIZE],
        sample_rate: SAMPLE_RATE,
        channels: 1,
        timestamp_ms: 0,
    };
    assert_eq!(frame.duration_ms(), 170);

    let stereo = AudioFrame {
        samples: vec![0.0; 4800],
        sample_rate: 24000,
        channels: 2,
        timestamp_ms: 0,
    };
    assert_eq!(stereo.duration_ms(), 100);
}

#[test]
fn test_capture_constraints_default() {
    let constraints = CaptureConstraints::default();

    assert_eq!(constraints.sample_rate, 24000, "Wire rate is 24kHz");
    assert_eq!(constraints.channels, 1, "Capture is mono");
    assert_eq!(constraints.block_size, 4096);
    assert!(constraints.echo_cancellation);
    assert!(constraints.noise_suppression);
    assert!(constraints.auto_gain_control);
    assert!(constraints.queue_capacity > 0);
}

#[test]
fn test_factory_creates_file_capture() -> Result<()> {
    let capture = AudioBackendFactory::create_capture(AudioSource::File("scene.wav".into()))?;
    assert_eq!(capture.name(), "WAV file");
    assert!(!capture.is_capturing());
    Ok(())
}

#[cfg(not(feature = "backend-cpal"))]
#[test]
fn test_factory_without_microphone_backend() {
    let result = AudioBackendFactory::create_capture(AudioSource::Microphone);
    assert!(matches!(result, Err(AudioError::DeviceUnavailable(_))));

    let output = AudioBackendFactory::create_output();
    assert_eq!(output.name(), "discard");
}

#[tokio::test]
async fn test_output_context_opens_once() -> Result<()> {
    let (device, probe) = MockOutput::new();
    let output = OutputContext::new(Arc::new(device), 24000);
    assert!(!output.is_ready());

    output.ensure_ready().await?;
    output.ensure_ready().await?;

    assert!(output.is_ready());
    assert_eq!(probe.opens.load(Ordering::SeqCst), 1, "stream is reused");
    assert_eq!(probe.resumes.load(Ordering::SeqCst), 2, "every call resumes");
    Ok(())
}

#[tokio::test]
async fn test_output_context_play_after_teardown_is_ignored() -> Result<()> {
    let (device, probe) = MockOutput::new();
    let output = OutputContext::new(Arc::new(device), 24000);

    output.play(&[0.1, 0.2]);
    assert!(probe.played().is_empty(), "nothing plays before the stream exists");

    output.ensure_ready().await?;
    output.play(&[0.1, 0.2]);
    assert_eq!(probe.played().len(), 1);

    output.teardown();
    output.teardown();
    output.play(&[0.3]);

    assert!(!output.is_ready());
    assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    assert_eq!(probe.played().len(), 1);

    // Recreated on the next use
    output.ensure_ready().await?;
    assert_eq!(probe.opens.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_output_context_clones_share_the_stream() -> Result<()> {
    let (device, probe) = MockOutput::new();
    let output = OutputContext::new(Arc::new(device), 24000);
    let other = output.clone();

    output.ensure_ready().await?;
    other.play(&[0.5]);

    assert!(other.is_ready());
    assert_eq!(probe.played(), vec![vec![0.5]]);
    Ok(())
}

#[tokio::test]
async fn test_output_open_yields_to_the_runtime() {
    let output = OutputContext::new(Arc::new(StalledOutput), 24000);

    // On a single-threaded runtime this only returns if the open awaits
    let result = tokio::time::timeout(Duration::from_millis(50), output.ensure_ready()).await;

    assert!(result.is_err());
    assert!(!output.is_ready());
    output.play(&[0.1]);
}

#[tokio::test]
async fn test_discard_output() -> Result<()> {
    let output = OutputContext::new(Arc::new(DiscardOutput), 24000);
    output.ensure_ready().await?;
    output.play(&[0.1; 64]);
    assert!(output.is_ready());
    output.teardown();
    assert!(!output.is_ready());
    Ok(())
}

#[tokio::test]
async fn test_bridge_capture_lifecycle() -> Result<()> {
    let (capture, capture_probe) = MockCapture::new();
    let (device, _) = MockOutput::new();
    let mut bridge = AudioBridge::new(
        Box::new(capture),
        OutputContext::new(Arc::new(device), 24000),
        CaptureConstraints::default(),
    );

    let _frames = bridge.start_capture().await?;
    assert!(bridge.is_capturing());

    bridge.stop_capture().await;
    bridge.stop_capture().await;

    assert!(!bridge.is_capturing());
    assert_eq!(capture_probe.stops.load(Ordering::SeqCst), 1, "second stop is a no-op");
    Ok(())
}

#[tokio::test]
async fn test_bridge_plays_through_shared_output() -> Result<()> {
    let (capture, _) = MockCapture::new();
    let (device, output_probe) = MockOutput::new();
    let bridge = AudioBridge::new(
        Box::new(capture),
        OutputContext::new(Arc::new(device), 24000),
        CaptureConstraints::default(),
    );

    bridge.ensure_output_ready().await?;
    bridge.play_frame(&[0.25, -0.25]);
    bridge.output().play(&[0.75]);

    assert_eq!(output_probe.played().len(), 2);

    bridge.teardown();
    assert!(!bridge.output().is_ready());
    Ok(())
}

#[tokio::test]
async fn test_bridge_start_surfaces_device_errors() {
    let (capture, probe) = MockCapture::new();
    probe.deny.store(true, Ordering::SeqCst);
    let (device, _) = MockOutput::new();
    let mut bridge = AudioBridge::new(
        Box::new(capture),
        OutputContext::new(Arc::new(device), 24000),
        CaptureConstraints::default(),
    );

    let result = bridge.start_capture().await;
    assert!(matches!(result, Err(AudioError::DeviceUnavailable(_))));
    assert!(!bridge.is_capturing());
}
