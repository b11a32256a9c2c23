use crate::session::SceneSession;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The one scene this process drives
    pub scene: SceneSession,
}

impl AppState {
    pub fn new(scene: SceneSession) -> Self {
        Self { scene }
    }
}
