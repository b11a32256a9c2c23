use super::state::AppState;
use crate::error::SessionError;
use crate::session::SceneState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub scene: SceneState,
}

/// GET /scene
/// Current scene state
pub async fn get_scene(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.scene.scene_state()))
}

/// POST /scene/start
/// Start the scene; returns once it is active or has failed
pub async fn start_scene(State(state): State<AppState>) -> impl IntoResponse {
    info!("Start requested");

    match state.scene.start().await {
        Ok(()) => (StatusCode::OK, Json(state.scene.scene_state())).into_response(),
        Err(SessionError::AlreadyActive) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: SessionError::AlreadyActive.to_string(),
                scene: state.scene.scene_state(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to start scene: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: e.to_string(),
                    scene: state.scene.scene_state(),
                }),
            )
                .into_response()
        }
    }
}

/// POST /scene/stop
/// Stop the scene; always succeeds
pub async fn stop_scene(State(state): State<AppState>) -> impl IntoResponse {
    info!("Stop requested");
    state.scene.stop().await;
    (StatusCode::OK, Json(state.scene.scene_state()))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
