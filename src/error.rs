use thiserror::Error;

/// Malformed PCM or transport payloads
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PcmError {
    /// PCM16 buffers carry two bytes per sample
    #[error("PCM16 buffer has odd length ({0} bytes)")]
    OddLength(usize),

    #[error("invalid transport text: {0}")]
    InvalidTransportText(String),
}

/// Audio device and capture errors
#[derive(Debug, Error)]
pub enum AudioError {
    /// Permission denied or no device present
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("capture already running")]
    AlreadyCapturing,

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("audio file error: {0}")]
    File(String),
}

/// Credential endpoint errors
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Network failure or non-success response
    #[error("failed to fetch token: {0}")]
    FetchFailed(String),

    /// Response did not match `{token, endpoint, expires_at}`
    #[error("invalid token response: {0}")]
    ShapeInvalid(String),
}

/// Realtime connection errors
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("channel is not open")]
    NotOpen,
}

/// Failures surfaced by the session state machine
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a scene is already active")]
    AlreadyActive,

    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("failed to fetch token: {0}")]
    CredentialFetchFailed(String),

    #[error("invalid token response: {0}")]
    CredentialShapeInvalid(String),

    #[error("token expired at {0}")]
    CredentialExpired(String),

    #[error("failed to open realtime connection: {0}")]
    ChannelOpenFailed(String),

    /// Display stays generic; the detail is only logged
    #[error("Connection failed")]
    TransportError(String),

    #[error("scene stopped while connecting")]
    Stopped,

    #[error("timed out after {0}ms while connecting")]
    ConnectTimeout(u64),

    #[error("audio error: {0}")]
    Audio(String),
}

impl From<AudioError> for SessionError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::DeviceUnavailable(msg) => SessionError::PermissionDenied(msg),
            other => SessionError::Audio(other.to_string()),
        }
    }
}

impl From<CredentialError> for SessionError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::FetchFailed(msg) => SessionError::CredentialFetchFailed(msg),
            CredentialError::ShapeInvalid(msg) => SessionError::CredentialShapeInvalid(msg),
        }
    }
}

impl From<RealtimeError> for SessionError {
    fn from(err: RealtimeError) -> Self {
        SessionError::ChannelOpenFailed(err.to_string())
    }
}
