pub mod audio;
pub mod config;
pub mod credential;
pub mod error;
pub mod http;
pub mod realtime;
pub mod session;

pub use audio::{
    AudioBackendFactory, AudioBridge, AudioFile, AudioFrame, AudioSource, CaptureBackend,
    CaptureConstraints, OutputContext, OutputDevice,
};
pub use config::Config;
pub use credential::{Credential, CredentialFetcher, HttpCredentialFetcher};
pub use error::{AudioError, CredentialError, PcmError, RealtimeError, SessionError};
pub use http::{create_router, AppState};
pub use realtime::{ChannelEvent, Connector, ServerEvent, SessionChannel, WebSocketConnector};
pub use session::{SceneSession, SceneState, SessionConfig, SessionStatus};
