//! HTTP/SSE control surface
//!
//! Base URL: http://localhost:5780 (configurable)

pub mod handlers;
pub mod sse;

use crate::error::{Error, Result};
use crate::state::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
}

/// Build the router with every endpoint
pub fn create_router(state: Arc<SharedState>) -> Router {
    let ctx = AppContext { state };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/build_info", get(handlers::build_info))
        // Session
        .route("/patterns", get(handlers::list_patterns))
        .route("/session", get(handlers::get_session))
        .route("/session/start", post(handlers::start_session))
        .route("/session/pause", post(handlers::pause_session))
        .route("/session/reset", post(handlers::reset_session))
        // Narration
        .route("/voice", post(handlers::set_voice))
        .route("/audio", get(handlers::get_audio))
        .route("/audio/stop", post(handlers::stop_audio))
        .route("/narration/volume", post(handlers::set_narration_volume))
        .route("/narration/retry", post(handlers::retry_narration))
        // Ambient
        .route("/ambient/play", post(handlers::play_ambient))
        .route("/ambient/next", post(handlers::set_ambient_next))
        .route("/ambient/pause", post(handlers::pause_ambient))
        .route("/ambient/resume", post(handlers::resume_ambient))
        .route("/ambient/seek", post(handlers::seek_ambient))
        .route("/ambient/volume", post(handlers::set_ambient_volume))
        .route("/ambient/loop", post(handlers::set_ambient_loop))
        .route("/ambient/retry", post(handlers::retry_ambient))
        // SSE event stream
        .route("/events", get(sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local UIs
        .layer(CorsLayer::permissive())
}

/// Serve the API until `shutdown` resolves
pub async fn run<F>(port: u16, state: Arc<SharedState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
