pub mod config;
pub mod error;
pub mod validation;

use std::{sync::Arc, time::Instant};

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tts_core::{Device, SpeechGenerator, DEFAULT_MAX_AUDIO_LENGTH_MS};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::validation::validate_generate_request;

/// Process-wide state, built once at startup and shared read-only.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<dyn SpeechGenerator>,
    pub device: Device,
}

impl AppState {
    pub fn new(generator: Arc<dyn SpeechGenerator>, device: Device) -> Self {
        Self { generator, device }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub text: String,
    #[serde(default)]
    pub speaker: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Base64 WAV file.
    pub audio: String,
    pub sample_rate: u32,
    pub text: String,
    pub speaker: i64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub device: Device,
}

/// Routes plus request tracing. CORS is added by the caller.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/generate", post(generate_speech))
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// CORS from configuration; permissive when no origins are listed.
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false);

    let Some(allowed_origins) = config.cors_allowed_origins.as_ref() else {
        return base.allow_origin(Any);
    };

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
        base.allow_origin(Any)
    } else {
        info!("CORS configured for {} origin(s)", origins.len());
        base.allow_origin(AllowOrigin::list(origins))
    }
}

async fn add_request_id(request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        device: state.device,
    })
}

pub async fn generate_speech(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(req) = payload?;
    validate_generate_request(&req.text)?;

    let started = Instant::now();
    let generator = state.generator.clone();
    let text = req.text.clone();
    let speaker = req.speaker;

    // Generation occupies a blocking-pool thread for its full duration
    let (audio, sample_rate, duration_ms) = tokio::task::spawn_blocking(move || {
        let waveform = generator.generate(&text, speaker, &[], DEFAULT_MAX_AUDIO_LENGTH_MS)?;
        let sample_rate = generator.sample_rate();
        let audio = tts_core::encode_wav_base64(&waveform.samples, sample_rate)?;
        Ok::<_, anyhow::Error>((audio, sample_rate, waveform.duration_ms()))
    })
    .await
    .map_err(|e| ApiError::InternalError(format!("Task join error: {e}")))??;

    info!(
        "Generated {}ms of audio at {} Hz for speaker {} (text length={}) in {:.2}s",
        duration_ms,
        sample_rate,
        req.speaker,
        req.text.len(),
        started.elapsed().as_secs_f64()
    );

    Ok(Json(GenerateResponse {
        audio,
        sample_rate,
        text: req.text,
        speaker: req.speaker,
    }))
}
