use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::messages::{ClientEvent, ServerEvent, SessionUpdate};
use super::transport::{Connector, Outbound, TransportEvent, TransportHandle};
use crate::audio::pcm;
use crate::credential::Credential;
use crate::error::RealtimeError;

/// Lifecycle of a session channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Handshake done, configuration not yet sent
    Connecting,
    /// Configuration sent; audio may flow
    Open,
    Closed,
}

/// Inbound events after dispatch on `type`
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Server(ServerEvent),
    /// Far end closed the connection
    Closed { code: Option<u16>, reason: String },
    /// Transport failure
    Failed(String),
}

/// The single connection to the realtime service
pub struct SessionChannel {
    outbound: mpsc::Sender<Outbound>,
    state: Arc<Mutex<ChannelState>>,
}

/// Ordered stream of inbound events for a [`SessionChannel`]
pub struct ChannelEvents {
    inbound: mpsc::Receiver<TransportEvent>,
    state: Arc<Mutex<ChannelState>>,
}

impl SessionChannel {
    /// Wrap a connected transport. Audio is dropped until [`SessionChannel::configure`] runs.
    pub fn new(transport: TransportHandle) -> (Self, ChannelEvents) {
        let state = Arc::new(Mutex::new(ChannelState::Connecting));
        (
            Self {
                outbound: transport.outbound,
                state: Arc::clone(&state),
            },
            ChannelEvents {
                inbound: transport.inbound,
                state,
            },
        )
    }

    /// Connect, send the session configuration and return the opened channel
    pub async fn open(
        connector: &dyn Connector,
        credential: &Credential,
        session: &SessionUpdate,
    ) -> Result<(Self, ChannelEvents), RealtimeError> {
        let transport = connector.connect(credential).await?;
        let (channel, events) = Self::new(transport);

        if let Err(e) = channel.configure(session).await {
            channel.close();
            return Err(e);
        }

        info!("Realtime channel opened (voice={})", session.voice);
        Ok((channel, events))
    }

    /// Send the `session.update` event and mark the channel open
    pub async fn configure(&self, session: &SessionUpdate) -> Result<(), RealtimeError> {
        if self.state() != ChannelState::Connecting {
            return Err(RealtimeError::NotOpen);
        }

        let event = ClientEvent::SessionUpdate {
            session: session.clone(),
        };
        let json = event
            .to_json()
            .map_err(|e| RealtimeError::Serialization(e.to_string()))?;

        self.outbound
            .send(Outbound::Text(json))
            .await
            .map_err(|_| RealtimeError::Transport("connection dropped before configuration".to_string()))?;

        self.set_state_if(ChannelState::Connecting, ChannelState::Open);
        if self.state() == ChannelState::Open {
            Ok(())
        } else {
            Err(RealtimeError::NotOpen)
        }
    }

    /// Send one PCM16 frame as `input_audio_buffer.append`
    ///
    /// Returns `false` when the frame was dropped because the channel is not
    /// open or the outbound queue is full.
    pub fn send_audio(&self, pcm16: &[u8]) -> bool {
        if self.state() != ChannelState::Open {
            debug!("Channel not open, dropping {} bytes of audio", pcm16.len());
            return false;
        }

        let event = ClientEvent::InputAudioBufferAppend {
            audio: pcm::to_transport_text(pcm16),
        };
        let json = match event.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize audio append: {}", e);
                return false;
            }
        };

        match self.outbound.try_send(Outbound::Text(json)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Outbound queue full, dropping audio frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.set_state(ChannelState::Closed);
                false
            }
        }
    }

    /// Close the connection. Safe to call more than once.
    pub fn close(&self) {
        let previous = {
            let mut state = lock(&self.state);
            std::mem::replace(&mut *state, ChannelState::Closed)
        };

        if previous != ChannelState::Closed {
            let _ = self.outbound.try_send(Outbound::Close);
            info!("Realtime channel closed");
        }
    }

    pub fn state(&self) -> ChannelState {
        *lock(&self.state)
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    fn set_state(&self, next: ChannelState) {
        *lock(&self.state) = next;
    }

    fn set_state_if(&self, expected: ChannelState, next: ChannelState) {
        let mut state = lock(&self.state);
        if *state == expected {
            *state = next;
        }
    }
}

impl ChannelEvents {
    /// Next inbound event, in arrival order
    ///
    /// Unparseable messages are logged and skipped. Returns `None` once the
    /// transport has gone away.
    pub async fn next(&mut self) -> Option<ChannelEvent> {
        loop {
            let event = match self.inbound.recv().await {
                Some(event) => event,
                None => {
                    *lock(&self.state) = ChannelState::Closed;
                    return None;
                }
            };

            match event {
                TransportEvent::Message(text) => match ServerEvent::parse(&text) {
                    Ok(event) => return Some(ChannelEvent::Server(event)),
                    Err(e) => {
                        warn!("Failed to parse server event: {}", e);
                        continue;
                    }
                },
                TransportEvent::Closed { code, reason } => {
                    *lock(&self.state) = ChannelState::Closed;
                    return Some(ChannelEvent::Closed { code, reason });
                }
                TransportEvent::Error(message) => {
                    *lock(&self.state) = ChannelState::Closed;
                    return Some(ChannelEvent::Failed(message));
                }
            }
        }
    }
}

fn lock(state: &Mutex<ChannelState>) -> std::sync::MutexGuard<'_, ChannelState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
