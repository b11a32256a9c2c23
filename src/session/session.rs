use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::SessionConfig;
use super::state::SceneState;
use crate::audio::{pcm, AudioBridge, AudioFrame, OutputContext};
use crate::credential::CredentialFetcher;
use crate::error::SessionError;
use crate::realtime::{ChannelEvent, ChannelEvents, Connector, ServerEvent, SessionChannel};

/// A voice scene: drives capture, the realtime channel and playback through
/// `idle -> connecting -> active -> idle`, with `error` reachable from
/// `connecting` and `active`.
///
/// Cloning yields another handle to the same scene.
#[derive(Clone)]
pub struct SceneSession {
    inner: Arc<Inner>,
}

struct Inner {
    config: SessionConfig,
    fetcher: Arc<dyn CredentialFetcher>,
    connector: Arc<dyn Connector>,

    /// Capture device and shared output context
    bridge: Mutex<AudioBridge>,

    /// Playback handle used from the event loop without locking the bridge
    output: OutputContext,

    /// Published scene state
    state: watch::Sender<SceneState>,

    /// Bumped when an attempt begins and whenever a scene ends, always under
    /// `active`. Work from an older generation never touches the bridge or state.
    generation: AtomicU64,

    /// The live scene, if any
    active: Mutex<Option<ActiveScene>>,

    /// Wakes a `start()` that is still connecting when `stop()` runs
    cancel: Notify,
}

struct ActiveScene {
    scene_id: Uuid,
    channel: Arc<SessionChannel>,
    pump: Option<JoinHandle<()>>,
}

type Connected = (SessionChannel, ChannelEvents, mpsc::Receiver<AudioFrame>);

impl SceneSession {
    pub fn new(
        config: SessionConfig,
        bridge: AudioBridge,
        fetcher: Arc<dyn CredentialFetcher>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let output = bridge.output();
        let (state, _) = watch::channel(SceneState::idle());

        Self {
            inner: Arc::new(Inner {
                config,
                fetcher,
                connector,
                bridge: Mutex::new(bridge),
                output,
                state,
                generation: AtomicU64::new(0),
                active: Mutex::new(None),
                cancel: Notify::new(),
            }),
        }
    }

    /// Start a scene
    ///
    /// Fails fast with [`SessionError::AlreadyActive`] unless the scene is idle
    /// or in error. Any other failure is recorded as the `error` status (with
    /// everything acquired so far released) and also returned.
    pub async fn start(&self) -> Result<(), SessionError> {
        let (generation, cancelled) = {
            let _active = self.inner.active.lock().await;
            let began = self.inner.state.send_if_modified(|state| {
                if state.can_start() {
                    state.begin_connecting();
                    true
                } else {
                    false
                }
            });
            if !began {
                warn!("Scene already started");
                return Err(SessionError::AlreadyActive);
            }
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            (generation, self.inner.cancel.notified())
        };

        let scene_id = Uuid::new_v4();
        info!("Starting scene: {}", scene_id);

        let timeout = self.inner.config.connect_timeout;
        let result = tokio::select! {
            result = tokio::time::timeout(timeout, self.inner.connect(generation)) => match result {
                Ok(result) => result,
                Err(_) => Err(SessionError::ConnectTimeout(timeout.as_millis() as u64)),
            },
            _ = cancelled => {
                // stop() owns the cleanup of anything this attempt acquired
                info!("Scene {} stopped while connecting", scene_id);
                return Ok(());
            }
        };

        let mut active = self.inner.active.lock().await;
        if !self.inner.is_current(generation) {
            drop(active);
            info!("Scene {} stopped while connecting", scene_id);
            if let Ok((channel, _, _)) = result {
                channel.close();
            }
            return Ok(());
        }

        let (channel, events, capture_rx) = match result {
            Ok(connected) => connected,
            Err(e) => {
                error!("Failed to start scene {}: {}", scene_id, e);
                self.inner.bridge.lock().await.stop_capture().await;
                self.inner.state.send_modify(|state| state.fail(e.to_string()));
                return Err(e);
            }
        };

        let channel = Arc::new(channel);
        self.inner.state.send_modify(|state| state.activate());

        let pump = tokio::spawn(Inner::pump(
            Arc::clone(&self.inner),
            generation,
            Arc::clone(&channel),
            events,
            capture_rx,
        ));

        *active = Some(ActiveScene {
            scene_id,
            channel,
            pump: Some(pump),
        });

        info!("Scene {} active", scene_id);
        Ok(())
    }

    /// Stop the scene and return to a fresh idle state
    ///
    /// Safe from any state and safe to repeat.
    pub async fn stop(&self) {
        let (generation, scene) = {
            let mut active = self.inner.active.lock().await;
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            self.inner.cancel.notify_waiters();
            (generation, active.take())
        };

        if let Some(mut scene) = scene {
            info!("Stopping scene: {}", scene.scene_id);
            scene.channel.close();
            if let Some(pump) = scene.pump.take() {
                pump.abort();
                let _ = pump.await;
            }
        }

        let _active = self.inner.active.lock().await;
        if !self.inner.is_current(generation) {
            // A new scene started from idle or error in the meantime and owns the bridge
            debug!("Scene restarted during stop");
            return;
        }

        {
            let mut bridge = self.inner.bridge.lock().await;
            bridge.stop_capture().await;
            bridge.teardown();
        }

        self.inner.state.send_modify(SceneState::reset);
        debug!("Scene reset to idle");
    }

    /// Snapshot of the current state
    pub fn scene_state(&self) -> SceneState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SceneState> {
        self.inner.state.subscribe()
    }

    pub async fn is_capturing(&self) -> bool {
        self.inner.bridge.lock().await.is_capturing()
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Output, capture, credential, channel - in that order
    async fn connect(&self, generation: u64) -> Result<Connected, SessionError> {
        let capture_rx = {
            let mut bridge = self.bridge.lock().await;
            if !self.is_current(generation) {
                return Err(SessionError::Stopped);
            }
            bridge
                .ensure_output_ready()
                .await
                .map_err(|e| SessionError::Audio(e.to_string()))?;
            bridge.start_capture().await?
        };

        let credential = self.fetcher.fetch().await?;
        if credential.is_expired() {
            return Err(SessionError::CredentialExpired(
                credential.expires_at.to_rfc3339(),
            ));
        }

        let (channel, events) = SessionChannel::open(
            self.connector.as_ref(),
            &credential,
            &self.config.session_update,
        )
        .await?;

        Ok((channel, events, capture_rx))
    }

    /// Forward captured frames out and dispatch inbound events until the scene ends
    async fn pump(
        self: Arc<Self>,
        generation: u64,
        channel: Arc<SessionChannel>,
        mut events: ChannelEvents,
        mut capture_rx: mpsc::Receiver<AudioFrame>,
    ) {
        let mut capture_open = true;
        let mut frames_sent: u64 = 0;

        loop {
            tokio::select! {
                frame = capture_rx.recv(), if capture_open => {
                    match frame {
                        Some(frame) => {
                            if !self.is_current(generation) {
                                break;
                            }
                            if channel.send_audio(&pcm::encode_frame(&frame.samples)) {
                                frames_sent += 1;
                            }
                        }
                        None => {
                            debug!("Capture stream ended after {} frames", frames_sent);
                            capture_open = false;
                        }
                    }
                }

                event = events.next() => {
                    if !self.is_current(generation) {
                        break;
                    }
                    match event {
                        Some(ChannelEvent::Server(event)) => self.handle_server_event(event),
                        Some(ChannelEvent::Closed { code, reason }) => {
                            info!("Realtime connection closed (code={:?}, reason={:?})", code, reason);
                            self.end_scene(generation, None).await;
                            break;
                        }
                        Some(ChannelEvent::Failed(message)) => {
                            let err = SessionError::TransportError(message);
                            error!("Realtime transport error: {:?}", err);
                            self.end_scene(generation, Some(err)).await;
                            break;
                        }
                        None => {
                            info!("Realtime connection dropped");
                            self.end_scene(generation, None).await;
                            break;
                        }
                    }
                }
            }
        }

        debug!("Scene event loop finished ({} frames sent)", frames_sent);
    }

    fn handle_server_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::AudioDelta { delta } => match pcm::transport_to_frame(&delta) {
                Ok(samples) => self.output.play(&samples),
                Err(e) => warn!("Dropping audio delta: {}", e),
            },
            ServerEvent::TextDelta { delta } => {
                self.state
                    .send_if_modified(|state| state.append_transcript(&delta));
            }
            ServerEvent::Error(detail) => {
                warn!(
                    "Realtime service error (code={:?}): {}",
                    detail.code,
                    detail.message.as_deref().unwrap_or("unknown")
                );
            }
            ServerEvent::Other { kind } => debug!("Ignoring server event: {}", kind),
        }
    }

    /// Release the scene after the connection ended on its own
    ///
    /// A remote close resets to idle; a transport failure records `error`.
    /// The output context stays open for a quick restart.
    async fn end_scene(&self, generation: u64, failure: Option<SessionError>) {
        let mut active = self.active.lock().await;
        if !self.is_current(generation) {
            return;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);

        // The pump handle belongs to the running task; let it finish on its own
        if let Some(scene) = active.take() {
            scene.channel.close();
            info!("Scene {} ended", scene.scene_id);
        }

        self.bridge.lock().await.stop_capture().await;

        match failure {
            Some(err) => self.state.send_modify(|state| state.fail(err.to_string())),
            None => self.state.send_modify(SceneState::reset),
        }
    }
}
