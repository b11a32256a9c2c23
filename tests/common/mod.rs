// Test doubles for the scene's collaborators
//
// Each double hands the test a probe (shared Arc state) so it can observe what
// the session did and drive the far end of the connection.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{Duration as ChronoDuration, Utc};
use improv_scene::audio::{
    AudioBridge, AudioFrame, CaptureBackend, CaptureConstraints, OutputContext, OutputDevice,
    OutputStream,
};
use improv_scene::realtime::{Connector, Outbound, TransportEvent, TransportHandle};
use improv_scene::session::{SceneSession, SceneState, SessionConfig};
use improv_scene::{AudioError, Credential, CredentialError, CredentialFetcher, RealtimeError};
use tokio::sync::mpsc;

pub const WAIT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Capture

#[derive(Default)]
pub struct CaptureProbe {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub capturing: AtomicBool,
    pub deny: AtomicBool,
    pub frames: Mutex<Option<mpsc::Sender<AudioFrame>>>,
}

impl CaptureProbe {
    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    /// Push one frame as if the microphone produced it
    pub async fn emit(&self, samples: Vec<f32>) -> Result<()> {
        let tx = self
            .frames
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow!("capture not started"))?;
        tx.send(AudioFrame {
            samples,
            sample_rate: 24_000,
            channels: 1,
            timestamp_ms: 0,
        })
        .await?;
        Ok(())
    }
}

pub struct MockCapture {
    probe: Arc<CaptureProbe>,
}

impl MockCapture {
    pub fn new() -> (Self, Arc<CaptureProbe>) {
        let probe = Arc::new(CaptureProbe::default());
        (
            Self {
                probe: Arc::clone(&probe),
            },
            probe,
        )
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MockCapture {
    async fn start(
        &mut self,
        constraints: &CaptureConstraints,
    ) -> Result<mpsc::Receiver<AudioFrame>, AudioError> {
        if self.probe.deny.load(Ordering::SeqCst) {
            return Err(AudioError::DeviceUnavailable("Permission denied".to_string()));
        }
        if self.probe.is_capturing() {
            return Err(AudioError::AlreadyCapturing);
        }

        let (tx, rx) = mpsc::channel(constraints.queue_capacity.max(1));
        *self.probe.frames.lock().unwrap() = Some(tx);
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        self.probe.capturing.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), AudioError> {
        self.probe.frames.lock().unwrap().take();
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        self.probe.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.probe.is_capturing()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Output

#[derive(Default)]
pub struct OutputProbe {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub resumes: AtomicUsize,
    pub played: Mutex<Vec<Vec<f32>>>,
}

impl OutputProbe {
    pub fn played(&self) -> Vec<Vec<f32>> {
        self.played.lock().unwrap().clone()
    }
}

pub struct MockOutput {
    probe: Arc<OutputProbe>,
}

impl MockOutput {
    pub fn new() -> (Self, Arc<OutputProbe>) {
        let probe = Arc::new(OutputProbe::default());
        (
            Self {
                probe: Arc::clone(&probe),
            },
            probe,
        )
    }
}

struct MockStream {
    probe: Arc<OutputProbe>,
    closed: bool,
}

#[async_trait::async_trait]
impl OutputDevice for MockOutput {
    async fn open(&self, _sample_rate: u32) -> Result<Box<dyn OutputStream>, AudioError> {
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStream {
            probe: Arc::clone(&self.probe),
            closed: false,
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

impl OutputStream for MockStream {
    fn play(&mut self, samples: &[f32]) -> Result<(), AudioError> {
        self.probe.played.lock().unwrap().push(samples.to_vec());
        Ok(())
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.probe.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.probe.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

// ---------------------------------------------------------------------------
// Credentials

pub fn credential_valid_for(secs: i64) -> Credential {
    Credential {
        token: "ek_test_token".to_string(),
        endpoint: "wss://realtime.test/v1".to_string(),
        expires_at: Utc::now() + ChronoDuration::seconds(secs),
    }
}

#[derive(Clone, Copy, PartialEq)]
pub enum FetchBehavior {
    Valid,
    Expired,
    FetchFailed,
    ShapeInvalid,
    Hang,
}

pub struct MockFetcher {
    pub behavior: Mutex<FetchBehavior>,
    pub calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new(behavior: FetchBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, behavior: FetchBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CredentialFetcher for MockFetcher {
    async fn fetch(&self) -> Result<Credential, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            FetchBehavior::Valid => Ok(credential_valid_for(60)),
            FetchBehavior::Expired => Ok(credential_valid_for(-60)),
            FetchBehavior::FetchFailed => Err(CredentialError::FetchFailed(
                "token endpoint returned 500 Internal Server Error".to_string(),
            )),
            FetchBehavior::ShapeInvalid => Err(CredentialError::ShapeInvalid(
                "missing field `token`".to_string(),
            )),
            FetchBehavior::Hang => std::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Realtime connection

/// The service side of one mock connection
pub struct RemoteEnd {
    pub outbound: mpsc::Receiver<Outbound>,
    pub inbound: mpsc::Sender<TransportEvent>,
}

impl RemoteEnd {
    /// Next message the client sent, parsed as JSON
    pub async fn next_json(&mut self) -> Result<serde_json::Value> {
        match tokio::time::timeout(WAIT, self.outbound.recv()).await? {
            Some(Outbound::Text(text)) => Ok(serde_json::from_str(&text)?),
            Some(Outbound::Close) => Err(anyhow!("client closed the connection")),
            None => Err(anyhow!("outbound queue dropped")),
        }
    }

    /// Everything sent so far without waiting
    pub fn drain(&mut self) -> Vec<Outbound> {
        let mut sent = Vec::new();
        while let Ok(message) = self.outbound.try_recv() {
            sent.push(message);
        }
        sent
    }

    pub async fn send_event(&self, event: serde_json::Value) -> Result<()> {
        self.inbound
            .send(TransportEvent::Message(event.to_string()))
            .await?;
        Ok(())
    }

    pub async fn close(&self, code: u16, reason: &str) -> Result<()> {
        self.inbound
            .send(TransportEvent::Closed {
                code: Some(code),
                reason: reason.to_string(),
            })
            .await?;
        Ok(())
    }

    pub async fn fail(&self, message: &str) -> Result<()> {
        self.inbound
            .send(TransportEvent::Error(message.to_string()))
            .await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MockConnector {
    pub calls: AtomicUsize,
    pub refuse: AtomicBool,
    remotes: Mutex<Vec<RemoteEnd>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Far end of the most recent connection
    pub fn take_remote(&self) -> Result<RemoteEnd> {
        self.remotes
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| anyhow!("no connection was opened"))
    }
}

#[async_trait::async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _credential: &Credential) -> Result<TransportHandle, RealtimeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(RealtimeError::ConnectionFailed("handshake refused".to_string()));
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        self.remotes.lock().unwrap().push(RemoteEnd {
            outbound: outbound_rx,
            inbound: inbound_tx,
        });

        Ok(TransportHandle {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

// ---------------------------------------------------------------------------
// Scene fixture

pub struct Fixture {
    pub scene: SceneSession,
    pub capture: Arc<CaptureProbe>,
    pub output: Arc<OutputProbe>,
    pub fetcher: Arc<MockFetcher>,
    pub connector: Arc<MockConnector>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let (capture, capture_probe) = MockCapture::new();
        let (output, output_probe) = MockOutput::new();
        let fetcher = MockFetcher::new(FetchBehavior::Valid);
        let connector = MockConnector::new();

        let bridge = AudioBridge::new(
            Box::new(capture),
            OutputContext::new(Arc::new(output), 24_000),
            CaptureConstraints::default(),
        );
        let scene = SceneSession::new(
            config,
            bridge,
            Arc::clone(&fetcher) as Arc<dyn CredentialFetcher>,
            Arc::clone(&connector) as Arc<dyn Connector>,
        );

        Self {
            scene,
            capture: capture_probe,
            output: output_probe,
            fetcher,
            connector,
        }
    }

    /// Wait until the published state satisfies `pred`
    pub async fn wait_for<F>(&self, pred: F) -> Result<SceneState>
    where
        F: Fn(&SceneState) -> bool,
    {
        let mut updates = self.scene.subscribe();
        let state = tokio::time::timeout(WAIT, updates.wait_for(|s| pred(s))).await??;
        Ok(state.clone())
    }
}

/// Poll a condition that is not published through the scene state
pub async fn eventually<F>(check: F) -> Result<()>
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        if tokio::time::Instant::now() >= deadline {
            return Err(anyhow!("condition not met within {:?}", WAIT));
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    Ok(())
}
