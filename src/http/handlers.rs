use super::state::AppState;
use crate::session::{LiveConfig, LiveSession, SessionSnapshot, SessionState};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StartLiveRequest {
    /// Voice override for this session
    pub voice: Option<String>,

    /// System prompt override for this session
    pub system_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartLiveResponse {
    pub session_id: String,
    pub state: SessionState,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopLiveResponse {
    pub session_id: String,
    pub message: String,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub user: String,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /live/start
/// Start the live session (one at a time)
pub async fn start_live(
    State(state): State<AppState>,
    Json(req): Json<StartLiveRequest>,
) -> impl IntoResponse {
    // Hold the slot for the whole operation so two concurrent starts
    // can't both get through
    let mut live = state.live.write().await;

    if let Some(session) = live.as_ref() {
        if session.state() != SessionState::Closed {
            return (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: format!("live session {} is already active", session.session_id()),
                }),
            )
                .into_response();
        }
    }

    let config = LiveConfig {
        session_id: format!("live-{}", uuid::Uuid::new_v4()),
        model: state.config.live.model.clone(),
        voice: req.voice.unwrap_or_else(|| state.config.live.voice.clone()),
        system_prompt: req
            .system_prompt
            .unwrap_or_else(|| state.config.live.system_prompt.clone()),
        input_sample_rate: state.config.audio.input_sample_rate,
        output_sample_rate: state.config.audio.output_sample_rate,
        frame_size: state.config.audio.frame_size,
    };

    info!("starting live session: {}", config.session_id);

    let session = Arc::new(LiveSession::new(
        config,
        Arc::clone(&state.channel),
        Arc::clone(&state.device),
    ));

    if let Err(e) = session.start().await {
        error!("failed to start live session: {:#}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("failed to start live session: {:#}", e),
            }),
        )
            .into_response();
    }

    let session_id = session.session_id().to_string();
    let current = session.state();
    *live = Some(session);

    (
        StatusCode::OK,
        Json(StartLiveResponse {
            session_id: session_id.clone(),
            state: current,
            message: format!("live session {} started", session_id),
        }),
    )
        .into_response()
}

/// POST /live/stop
/// Close the active live session
pub async fn stop_live(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.live.write().await.take();

    match session {
        Some(session) => {
            info!("stopping live session: {}", session.session_id());
            session.close().await;
            let snapshot = session.snapshot().await;

            (
                StatusCode::OK,
                Json(StopLiveResponse {
                    session_id: session.session_id().to_string(),
                    message: "live session closed".to_string(),
                    snapshot,
                }),
            )
                .into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no active live session".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /live/status
/// Snapshot of the active live session
pub async fn live_status(State(state): State<AppState>) -> impl IntoResponse {
    let live = state.live.read().await;

    match live.as_ref() {
        Some(session) => (StatusCode::OK, Json(session.snapshot().await)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no active live session".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /live/transcript
/// Current-turn transcripts for both directions
pub async fn live_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let live = state.live.read().await;

    match live.as_ref() {
        Some(session) => {
            let snapshot = session.snapshot().await;
            (
                StatusCode::OK,
                Json(TranscriptResponse {
                    user: snapshot.user_transcript,
                    model: snapshot.model_transcript,
                }),
            )
                .into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no active live session".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
