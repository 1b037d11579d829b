//! HTTP server setup and routing.
//!
//! Serves the embedded single-page UI at `/` and the JSON API behind it.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::audio::AudioStore;
use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::models::ModelHandle;

/// Shared application context passed to all handlers.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServiceConfig>,
    /// Lazily loaded, process-wide model handle.
    pub models: Arc<ModelHandle>,
    pub store: AudioStore,
}

/// Builds the router with all routes and middleware.
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        // Single-page UI
        .route("/", get(index))
        // Health endpoint
        .route("/health", get(handlers::health))
        // Generation API
        .route("/generate", post(handlers::generate))
        // Raw WAV bytes for the inline player
        .route("/tracks/:track_id/audio", get(handlers::track_audio))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

async fn index() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

/// Runs the HTTP server until the process exits.
///
/// The model is not loaded here; the first generation request pays the
/// load cost so the UI comes up immediately.
pub async fn run(config: ServiceConfig) -> Result<()> {
    let store = AudioStore::new(config.audio_path.clone())?;

    let ctx = AppContext {
        config: Arc::new(config),
        models: Arc::new(ModelHandle::new()),
        store,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.config.port));
    info!("starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, router(ctx))
        .await
        .map_err(|e| ServiceError::http(format!("Server error: {}", e)))?;

    Ok(())
}
