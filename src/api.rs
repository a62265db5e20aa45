//! REST API
//!
//! Every JSON endpoint answers with the [`ApiResponse`] envelope. Scheduler
//! errors map to 409 (wrong run state), 422 (unusable config) and 502
//! (destination unreachable).

use crate::store::{Store, StoreError};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use noise_core::{
    Destination, Event, EventTypeInfo, GenerateError, NoiseConfig, NoiseError, NoiseGenerator,
    NoiseStatus, NoiseUpdateRequest, Overrides, SendError, SenderFactory,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub generator: NoiseGenerator,
    pub store: Arc<Store>,
    /// Used for one-off destination tests, outside any run
    pub factory: Arc<dyn SenderFactory>,
}

#[derive(Serialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found(what: &str, id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{} not found: {}", what, id))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::failure(self.message))).into_response()
    }
}

impl From<NoiseError> for ApiError {
    fn from(e: NoiseError) -> Self {
        let status = match e {
            NoiseError::AlreadyRunning | NoiseError::NotRunning => StatusCode::CONFLICT,
            NoiseError::NoValidSources | NoiseError::InvalidRate(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            NoiseError::Sender { .. } => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, e.to_string())
    }
}

impl From<GenerateError> for ApiError {
    fn from(e: GenerateError) -> Self {
        let status = match e {
            GenerateError::UnknownTemplate { .. } => StatusCode::NOT_FOUND,
            GenerateError::InvalidOverride { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            GenerateError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<SendError> for ApiError {
    fn from(e: SendError) -> Self {
        let status = match e {
            SendError::InvalidConfig(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

/// Store writes fsync the document, so they run on the blocking pool.
async fn persist<T, F>(store: &Arc<Store>, write: F) -> Result<T, ApiError>
where
    F: FnOnce(&Store) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || write(&store))
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(ApiError::from)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/event-types", get(list_event_types))
        .route("/api/event-types/{id}/generate", post(generate_preview))
        .route(
            "/api/destinations",
            get(list_destinations).post(save_destination),
        )
        .route("/api/destinations/{id}", delete(delete_destination))
        .route("/api/destinations/{id}/test", post(test_destination))
        .route("/api/noise/start", post(start_noise))
        .route("/api/noise/stop", post(stop_noise))
        .route("/api/noise/config", put(update_noise))
        .route("/api/noise/status", get(noise_status))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn metrics_handler() -> Result<String, ApiError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    String::from_utf8(buffer)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

// ============================================================================
// Event types
// ============================================================================

async fn list_event_types(State(state): State<AppState>) -> ApiResult<Vec<EventTypeInfo>> {
    ok(state.generator.registry().catalog())
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub template_id: String,
    #[serde(default)]
    pub overrides: Option<Overrides>,
}

async fn generate_preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Event> {
    let generator = state
        .generator
        .registry()
        .get(&id)
        .ok_or_else(|| ApiError::not_found("event type", &id))?;
    ok(generator.generate(&request.template_id, request.overrides.as_ref())?)
}

// ============================================================================
// Destinations
// ============================================================================

async fn list_destinations(State(state): State<AppState>) -> ApiResult<Vec<Destination>> {
    ok(state.store.destinations())
}

async fn save_destination(
    State(state): State<AppState>,
    Json(destination): Json<Destination>,
) -> ApiResult<Destination> {
    let saved = persist(&state.store, move |store| store.upsert_destination(destination)).await?;
    info!(destination = %saved.id, kind = saved.kind.label(), "Destination saved");
    ok(saved)
}

async fn delete_destination(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<String> {
    let target = id.clone();
    if !persist(&state.store, move |store| store.remove_destination(&target)).await? {
        return Err(ApiError::not_found("destination", &id));
    }
    info!(destination = %id, "Destination deleted");
    ok(id)
}

async fn test_destination(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<String> {
    let destination = state
        .store
        .destination(&id)
        .ok_or_else(|| ApiError::not_found("destination", &id))?;

    let sender = state.factory.connect(&destination).await?;
    let result = sender.test().await;
    if let Err(e) = sender.close().await {
        warn!(destination = %id, error = %e, "Failed to close test sender");
    }
    result?;
    ok(format!("destination {} is reachable", id))
}

// ============================================================================
// Noise generation
// ============================================================================

async fn start_noise(
    State(state): State<AppState>,
    Json(config): Json<NoiseConfig>,
) -> ApiResult<NoiseStatus> {
    let destinations = state.store.destination_map();
    state.generator.start(config.clone(), &destinations).await?;
    persist(&state.store, move |store| store.save_noise_config(&config)).await?;
    ok(state.generator.status())
}

async fn stop_noise(State(state): State<AppState>) -> ApiResult<NoiseStatus> {
    state.generator.stop().await?;
    ok(state.generator.status())
}

async fn update_noise(
    State(state): State<AppState>,
    Json(update): Json<NoiseUpdateRequest>,
) -> ApiResult<NoiseStatus> {
    state.generator.update_config(update)?;
    let status = state.generator.status();
    if let Some(config) = status.config.clone() {
        persist(&state.store, move |store| store.save_noise_config(&config)).await?;
    }
    ok(status)
}

async fn noise_status(State(state): State<AppState>) -> ApiResult<NoiseStatus> {
    ok(state.generator.status())
}
