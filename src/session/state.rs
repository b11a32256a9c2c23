use serde::{Deserialize, Serialize};

/// Connection status of the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Connecting,
    Active,
    Error,
}

/// State exposed to the presentation layer
///
/// `is_listening` is true only while `status` is `Active`; the transcript only
/// grows while the status is not `Idle` and is cleared by [`SceneState::reset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneState {
    pub status: SessionStatus,
    pub is_listening: bool,
    pub transcript: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SceneState {
    pub fn idle() -> Self {
        Self {
            status: SessionStatus::Idle,
            is_listening: false,
            transcript: String::new(),
            error: None,
        }
    }

    /// `start()` is only accepted from idle or error
    pub fn can_start(&self) -> bool {
        matches!(self.status, SessionStatus::Idle | SessionStatus::Error)
    }

    pub fn begin_connecting(&mut self) {
        self.status = SessionStatus::Connecting;
        self.is_listening = false;
        self.error = None;
    }

    /// Channel handshake and configuration completed
    pub fn activate(&mut self) {
        self.status = SessionStatus::Active;
        self.is_listening = true;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = SessionStatus::Error;
        self.is_listening = false;
        self.error = Some(message.into());
    }

    /// Append a text delta. Returns `false` (and leaves the state untouched) when idle.
    pub fn append_transcript(&mut self, delta: &str) -> bool {
        if self.status == SessionStatus::Idle || delta.is_empty() {
            return false;
        }
        self.transcript.push_str(delta);
        true
    }

    pub fn reset(&mut self) {
        *self = Self::idle();
    }
}

impl Default for SceneState {
    fn default() -> Self {
        Self::idle()
    }
}
