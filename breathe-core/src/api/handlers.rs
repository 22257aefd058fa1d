//! HTTP request handlers
//!
//! Control endpoints for the session, narration and ambient tracks.

use crate::api::AppContext;
use crate::engine::AudioSnapshot;
use crate::error::Error;
use crate::timer::SessionAudio;
use axum::{extract::State, http::StatusCode, Json};
use breathe_common::events::{PlaybackSnapshot, SessionSnapshot};
use breathe_common::BreathingPattern;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct BuildInfo {
    pub version: String,
    pub git_hash: String,
    pub build_timestamp: String,
    pub build_profile: String,
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pattern_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pattern_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VoiceRequest {
    persona: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    volume: f32, // 0.0-1.0
}

#[derive(Debug, Deserialize)]
pub struct AmbientPlayRequest {
    url: String,
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AmbientNextRequest {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    position: f64,
}

#[derive(Debug, Serialize)]
pub struct SeekResponse {
    applied: bool,
    snapshot: PlaybackSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct LoopRequest {
    enabled: bool,
}

type ApiError = (StatusCode, Json<StatusResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn error_response(error: Error) -> ApiError {
    let status = match &error {
        Error::PatternNotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidPattern(_) | Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        Error::Narration(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::Load(_) | Error::Playback(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!("Request failed: {}", error);
    }
    (
        status,
        Json(StatusResponse {
            status: error.to_string(),
        }),
    )
}

fn check_volume(volume: f32) -> Result<f32, ApiError> {
    if (0.0..=1.0).contains(&volume) {
        Ok(volume)
    } else {
        Err(error_response(Error::BadRequest(format!(
            "volume {} outside 0.0-1.0",
            volume
        ))))
    }
}

// ============================================================================
// Health / Build Info
// ============================================================================

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "breathe-core".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: ctx.state.started_at.elapsed().as_secs(),
    })
}

/// GET /build_info
pub async fn build_info() -> Json<BuildInfo> {
    Json(BuildInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
    })
}

// ============================================================================
// Session Endpoints
// ============================================================================

/// GET /patterns
pub async fn list_patterns(State(ctx): State<AppContext>) -> Json<Vec<BreathingPattern>> {
    Json(ctx.state.list_patterns().await)
}

/// GET /session
pub async fn get_session(State(ctx): State<AppContext>) -> Json<SessionSnapshot> {
    Json(ctx.state.session.snapshot())
}

/// POST /session/start
pub async fn start_session(
    State(ctx): State<AppContext>,
    Json(req): Json<StartRequest>,
) -> ApiResult<SessionSnapshot> {
    let pattern = ctx
        .state
        .find_pattern(&req.pattern_id)
        .await
        .map_err(error_response)?;
    let snapshot = ctx.state.session.start(pattern).map_err(error_response)?;
    info!("Session start requested: {}", req.pattern_id);
    Ok(Json(snapshot))
}

/// POST /session/pause
pub async fn pause_session(State(ctx): State<AppContext>) -> Json<SessionSnapshot> {
    Json(ctx.state.session.pause())
}

/// POST /session/reset
///
/// Body is optional; a `pattern_id` switches pattern as part of the reset.
pub async fn reset_session(
    State(ctx): State<AppContext>,
    body: Option<Json<ResetRequest>>,
) -> ApiResult<SessionSnapshot> {
    let pattern = match body.and_then(|Json(req)| req.pattern_id) {
        Some(id) => Some(ctx.state.find_pattern(&id).await.map_err(error_response)?),
        None => None,
    };
    let snapshot = ctx.state.session.reset(pattern).map_err(error_response)?;
    Ok(Json(snapshot))
}

// ============================================================================
// Narration Endpoints
// ============================================================================

/// POST /voice - activate a persona (`null` for pattern defaults)
pub async fn set_voice(
    State(ctx): State<AppContext>,
    Json(req): Json<VoiceRequest>,
) -> ApiResult<AudioSnapshot> {
    ctx.state
        .activate_persona(req.persona.as_deref())
        .await
        .map_err(error_response)?;
    Ok(Json(ctx.state.audio.snapshot()))
}

/// GET /audio
pub async fn get_audio(State(ctx): State<AppContext>) -> Json<AudioSnapshot> {
    Json(ctx.state.audio.snapshot())
}

/// POST /narration/volume
pub async fn set_narration_volume(
    State(ctx): State<AppContext>,
    Json(req): Json<VolumeRequest>,
) -> ApiResult<PlaybackSnapshot> {
    let volume = check_volume(req.volume)?;
    let controller = ctx.state.audio.narration.controller();
    controller.set_volume(volume);
    Ok(Json(controller.snapshot()))
}

/// POST /narration/retry
pub async fn retry_narration(State(ctx): State<AppContext>) -> Json<PlaybackSnapshot> {
    let controller = ctx.state.audio.narration.controller();
    controller.retry();
    Json(controller.snapshot())
}

// ============================================================================
// Ambient Endpoints
// ============================================================================

/// POST /ambient/play
pub async fn play_ambient(
    State(ctx): State<AppContext>,
    Json(req): Json<AmbientPlayRequest>,
) -> ApiResult<PlaybackSnapshot> {
    let url = req.url.trim();
    if url.is_empty() {
        return Err(error_response(Error::BadRequest("url is empty".to_string())));
    }
    let ambient = &ctx.state.audio.ambient;
    ambient.set_next(req.next_url.filter(|next| !next.trim().is_empty()));
    ambient.play(url);
    Ok(Json(ambient.snapshot()))
}

/// POST /ambient/next - queue (or clear) the crossfade follow-up
pub async fn set_ambient_next(
    State(ctx): State<AppContext>,
    Json(req): Json<AmbientNextRequest>,
) -> Json<PlaybackSnapshot> {
    let ambient = &ctx.state.audio.ambient;
    ambient.set_next(req.url.filter(|url| !url.trim().is_empty()));
    Json(ambient.snapshot())
}

/// POST /ambient/pause
pub async fn pause_ambient(State(ctx): State<AppContext>) -> Json<PlaybackSnapshot> {
    let ambient = &ctx.state.audio.ambient;
    ambient.pause();
    Json(ambient.snapshot())
}

/// POST /ambient/resume
pub async fn resume_ambient(State(ctx): State<AppContext>) -> ApiResult<PlaybackSnapshot> {
    let ambient = &ctx.state.audio.ambient;
    ambient.resume().await.map_err(error_response)?;
    Ok(Json(ambient.snapshot()))
}

/// POST /ambient/seek - no-op (applied = false) on live sources
pub async fn seek_ambient(
    State(ctx): State<AppContext>,
    Json(req): Json<SeekRequest>,
) -> ApiResult<SeekResponse> {
    if !req.position.is_finite() || req.position < 0.0 {
        return Err(error_response(Error::BadRequest(format!(
            "invalid position {}",
            req.position
        ))));
    }
    let ambient = &ctx.state.audio.ambient;
    let applied = ambient.seek(req.position);
    Ok(Json(SeekResponse {
        applied,
        snapshot: ambient.snapshot(),
    }))
}

/// POST /ambient/volume
pub async fn set_ambient_volume(
    State(ctx): State<AppContext>,
    Json(req): Json<VolumeRequest>,
) -> ApiResult<PlaybackSnapshot> {
    let volume = check_volume(req.volume)?;
    let ambient = &ctx.state.audio.ambient;
    ambient.set_volume(volume);
    Ok(Json(ambient.snapshot()))
}

/// POST /ambient/loop
pub async fn set_ambient_loop(
    State(ctx): State<AppContext>,
    Json(req): Json<LoopRequest>,
) -> Json<PlaybackSnapshot> {
    let ambient = &ctx.state.audio.ambient;
    ambient.set_loop(req.enabled);
    Json(ambient.snapshot())
}

/// POST /ambient/retry
pub async fn retry_ambient(State(ctx): State<AppContext>) -> Json<PlaybackSnapshot> {
    let ambient = &ctx.state.audio.ambient;
    ambient.retry();
    Json(ambient.snapshot())
}

/// POST /audio/stop - stop every output (session keeps its position)
pub async fn stop_audio(State(ctx): State<AppContext>) -> Json<AudioSnapshot> {
    ctx.state.audio.stop_all();
    Json(ctx.state.audio.snapshot())
}
