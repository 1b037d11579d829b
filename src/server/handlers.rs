//! HTTP request handlers.
//!
//! Implements the JSON API behind the web UI: health, generation, and
//! track playback. Validation failures come back as 400s with a
//! structured body; model and I/O faults become 5xx responses instead of
//! tearing down the request task.

use std::sync::Mutex;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::audio::store::data_uri;
use crate::audio::wav::{samples_to_duration, SAMPLE_RATE};
use crate::error::{ErrorCode, ServiceError};
use crate::generation::{pipeline, ProgressTracker};
use crate::models::handle;
use crate::server::AppContext;
use crate::types::{compute_track_id, validate_duration, validate_prompt, GenerationParams, Track};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    service: String,
    version: String,
    model_loaded: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub duration_sec: u32,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub track_id: String,
    pub file_name: String,
    pub duration_sec: f32,
    pub sample_rate: u32,
    pub generation_time_sec: f32,
    pub size_bytes: usize,
    /// `data:audio/wav;base64,...` URI for the download link.
    pub audio: String,
}

/// Maps a service error onto an HTTP status and JSON body.
pub fn error_response(err: ServiceError) -> (StatusCode, Json<ErrorBody>) {
    let status = if err.code.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        match err.code {
            ErrorCode::ModelNotFound | ErrorCode::ModelDownloadFailed => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    };
    (
        status,
        Json(ErrorBody {
            code: err.code.as_str().to_string(),
            message: err.message,
        }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "tunegen".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: ctx.models.is_loaded(),
    })
}

// ============================================================================
// Generation Endpoint
// ============================================================================

/// POST /generate - Generate one track from a prompt and duration
///
/// Runs the full pipeline on a blocking worker: load the model if this is
/// the first request, generate, persist, read back. The response carries
/// both the track id (for the inline player) and a data URI (for the
/// download link).
pub async fn generate(
    State(ctx): State<AppContext>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, (StatusCode, Json<ErrorBody>)> {
    validate_prompt(&req.prompt).map_err(error_response)?;
    validate_duration(
        req.duration_sec,
        ctx.config.min_duration_sec,
        ctx.config.max_duration_sec,
    )
    .map_err(error_response)?;

    let prompt = req.prompt.trim().to_string();
    let duration_sec = req.duration_sec;
    // Fresh seed per request: unique track id, unique output path
    let seed = rand::random::<u64>();

    info!(prompt = %prompt, duration_sec, seed, "generation requested");

    let worker_ctx = ctx.clone();
    let result = tokio::task::spawn_blocking(move || {
        run_generation(&worker_ctx, &prompt, duration_sec, seed)
    })
    .await
    .map_err(|e| {
        error!("generation task panicked: {}", e);
        error_response(ServiceError::model_inference_failed(format!(
            "Generation task failed: {}",
            e
        )))
    })?;

    let (track, bytes) = result.map_err(|err| {
        error!(code = %err.code, "generation failed: {}", err);
        error_response(err)
    })?;

    info!(
        track_id = %track.track_id,
        duration_sec = track.duration_sec,
        generation_time_sec = track.generation_time_sec,
        "track ready"
    );

    Ok(Json(GenerateResponse {
        file_name: crate::audio::AudioStore::file_name(&track.track_id),
        track_id: track.track_id,
        duration_sec: track.duration_sec,
        sample_rate: track.sample_rate,
        generation_time_sec: track.generation_time_sec,
        size_bytes: bytes.len(),
        audio: data_uri(&bytes),
    }))
}

/// Synchronous pipeline body: model access, generation, persistence.
fn run_generation(
    ctx: &AppContext,
    prompt: &str,
    duration_sec: u32,
    seed: u64,
) -> crate::error::Result<(Track, Vec<u8>)> {
    let started = Instant::now();

    let models = handle::acquire(&ctx.models, &ctx.config)?;
    let mut models = models
        .lock()
        .map_err(|_| ServiceError::model_inference_failed("Model handle poisoned"))?;

    let params = GenerationParams::for_duration(duration_sec, seed);
    let track_id = compute_track_id(prompt, seed, duration_sec, models.version());

    let tracker = Mutex::new(ProgressTracker::new(duration_sec));
    let samples = pipeline::generate_with_progress(&mut models, prompt, &params, |done, total| {
        if let Ok(mut tracker) = tracker.lock() {
            tracker.update(done);
            if let Some(percent) = tracker.should_notify() {
                debug!(percent, frames = done, total, "generation progress");
            }
        }
    })?;

    let path = ctx.store.save_waveform(&samples, &track_id)?;
    let bytes = ctx.store.read_bytes(&track_id)?;

    let track = Track::new(
        track_id,
        path,
        prompt.to_string(),
        samples_to_duration(samples.len()),
        SAMPLE_RATE,
        seed,
        models.version().to_string(),
        started.elapsed().as_secs_f32(),
    );

    Ok((track, bytes))
}

// ============================================================================
// Track Playback Endpoint
// ============================================================================

/// GET /tracks/:track_id/audio - Raw WAV bytes for the inline player
pub async fn track_audio(
    State(ctx): State<AppContext>,
    Path(track_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    // Track ids are hex; anything else never names a file of ours
    if track_id.is_empty() || !track_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(error_response(ServiceError::invalid_prompt(
            "Malformed track id",
        )));
    }

    if !ctx.store.exists(&track_id) {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                code: "TRACK_NOT_FOUND".to_string(),
                message: format!("No track with id {}", track_id),
            }),
        ));
    }

    let bytes = ctx.store.read_bytes(&track_id).map_err(error_response)?;
    Ok(([(header::CONTENT_TYPE, "audio/wav")], bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_400() {
        let (status, _) = error_response(ServiceError::invalid_prompt("empty"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = error_response(ServiceError::invalid_duration(31, 1, 30));
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_model_maps_to_503() {
        let (status, _) = error_response(ServiceError::model_not_found("/models"));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn inference_fault_maps_to_500() {
        let (status, body) = error_response(ServiceError::model_inference_failed("oom"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "MODEL_INFERENCE_FAILED");
    }

    #[test]
    fn generate_request_deserializes() {
        let req: GenerateRequest =
            serde_json::from_str(r#"{"prompt": "lofi beats", "duration_sec": 10}"#).unwrap();
        assert_eq!(req.prompt, "lofi beats");
        assert_eq!(req.duration_sec, 10);
    }
}
