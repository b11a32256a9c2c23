use std::time::Duration;

use crate::config::RealtimeConfig;
use crate::realtime::SessionUpdate;

/// Options for a scene session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound for the whole connecting phase (device, token, handshake)
    /// Default: 15 seconds
    pub connect_timeout: Duration,

    /// Configuration sent as `session.update` once the channel connects
    pub session_update: SessionUpdate,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            session_update: RealtimeConfig::default().session_update(),
        }
    }
}
