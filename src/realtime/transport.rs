use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::credential::Credential;
use crate::error::RealtimeError;

/// Buffered messages between the session and the socket task
pub const TRANSPORT_CHANNEL_CAPACITY: usize = 256;

/// Frames queued for the connection
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// Everything that arrives from the connection, in order
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Message(String),
    /// Far end closed (or the stream ended)
    Closed { code: Option<u16>, reason: String },
    /// Transport-level failure; no further events follow
    Error(String),
}

/// A connected transport: an outbound queue and the inbound event stream
pub struct TransportHandle {
    pub outbound: mpsc::Sender<Outbound>,
    pub inbound: mpsc::Receiver<TransportEvent>,
}

/// Opens realtime connections
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Complete the handshake using the credential as authorization
    async fn connect(&self, credential: &Credential) -> Result<TransportHandle, RealtimeError>;
}

/// WebSocket connector for the realtime API
pub struct WebSocketConnector {
    url: String,
    model: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            model: model.into(),
        }
    }

    /// Credential endpoint if it is a WebSocket URL, otherwise the configured URL
    pub fn resolve_url(&self, credential: &Credential) -> String {
        let endpoint = credential.endpoint.as_str();
        if endpoint.starts_with("wss://") || endpoint.starts_with("ws://") {
            endpoint.to_string()
        } else {
            format!("{}?model={}", self.url, self.model)
        }
    }
}

#[async_trait::async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, credential: &Credential) -> Result<TransportHandle, RealtimeError> {
        let url = self.resolve_url(credential);

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", credential.token))
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert(header::AUTHORIZATION, bearer);
        headers.insert("openai-beta", HeaderValue::from_static("realtime=v1"));

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        info!("Connected to realtime service at {}", url);

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(TRANSPORT_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<TransportEvent>(TRANSPORT_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outbound = outbound_rx.recv() => {
                        match outbound {
                            Some(Outbound::Text(text)) => {
                                if let Err(e) = ws_sink.send(Message::Text(text.into())).await {
                                    error!("Failed to send WebSocket message: {}", e);
                                    let _ = inbound_tx.send(TransportEvent::Error(e.to_string())).await;
                                    break;
                                }
                            }
                            Some(Outbound::Close) | None => {
                                debug!("Closing WebSocket");
                                if let Err(e) = ws_sink.close().await {
                                    debug!("WebSocket close failed: {}", e);
                                }
                                break;
                            }
                        }
                    }

                    incoming = ws_stream.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                let text = text.as_str().to_owned();
                                if inbound_tx.send(TransportEvent::Message(text)).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    warn!("Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                let (code, reason) = frame
                                    .map(|f| (Some(u16::from(f.code)), f.reason.as_str().to_owned()))
                                    .unwrap_or((None, String::new()));
                                info!("WebSocket closed by server (code={:?}, reason={:?})", code, reason);
                                let _ = inbound_tx.send(TransportEvent::Closed { code, reason }).await;
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!("WebSocket error: {}", e);
                                let _ = inbound_tx.send(TransportEvent::Error(e.to_string())).await;
                                break;
                            }
                            None => {
                                let _ = inbound_tx
                                    .send(TransportEvent::Closed { code: None, reason: "stream ended".to_string() })
                                    .await;
                                break;
                            }
                        }
                    }
                }
            }

            debug!("WebSocket task finished");
        });

        Ok(TransportHandle {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
