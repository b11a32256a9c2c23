//! HTTP control API for the presentation layer
//!
//! This module exposes the scene as a small REST API:
//! - GET /scene - Current scene state
//! - POST /scene/start - Start the scene
//! - POST /scene/stop - Stop the scene
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
