//! Scene session management
//!
//! This module provides the `SceneSession` state machine that manages:
//! - Microphone capture and the shared playback context
//! - Credential fetch and the realtime channel lifecycle
//! - Outbound audio framing and inbound event dispatch
//! - The `SceneState` published to the presentation layer

mod config;
mod session;
mod state;

pub use config::SessionConfig;
pub use session::SceneSession;
pub use state::{SceneState, SessionStatus};
