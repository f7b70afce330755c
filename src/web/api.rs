use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::client::ClientId;
use super::page::build_lda_page;
use crate::catalog::{AppEntry, AppId};
use crate::errors::StudioError;
use crate::training::{JobCoordinator, ProgressRecord, TrainingRequest};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub coordinator: JobCoordinator,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct AppQuery {
    pub app: Option<String>,
}

#[derive(Serialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub app: AppEntry,
    pub model_available: bool,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    TooManyRequests(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (
            status,
            Json(serde_json::json!({"status": "error", "message": message})),
        )
            .into_response()
    }
}

impl From<StudioError> for ApiError {
    fn from(e: StudioError) -> Self {
        match e {
            StudioError::UnknownApp(_) => ApiError::NotFound(e.to_string()),
            StudioError::InvalidAppId(_) => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

fn parse_app(raw: &str) -> Result<AppId, ApiError> {
    AppId::parse(raw).map_err(ApiError::from)
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_apps))
        .route("/lda/{app}", get(lda_page).post(start_training))
        .route("/progress", get(global_progress))
        .route("/progress/{app}", get(app_progress))
        .route("/cancel-training", post(cancel_from_body))
        .route("/cancel-training/{app}", post(cancel_app))
        .route("/training-status", get(training_status))
        .route("/cleanup-data/{app}", post(cleanup_data))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_apps(State(state): State<SharedState>) -> Json<Vec<CatalogEntry>> {
    let coordinator = &state.coordinator;
    let apps = coordinator
        .catalog()
        .apps()
        .iter()
        .map(|entry| CatalogEntry {
            model_available: AppId::parse(&entry.slug)
                .map(|id| coordinator.layout().model_file(&id).exists())
                .unwrap_or(false),
            app: entry.clone(),
        })
        .collect();
    Json(apps)
}

async fn start_training(
    State(state): State<SharedState>,
    ClientId(client): ClientId,
    Path(app): Path<String>,
) -> Result<Response, ApiError> {
    let app = parse_app(&app)?;
    match state.coordinator.request_training(&client, &app) {
        Ok(TrainingRequest::Started { session }) => Ok(Json(serde_json::json!({
            "status": "started",
            "app_name": app,
            "session": session,
        }))
        .into_response()),
        Ok(TrainingRequest::Rejected(rejection)) if rejection.is_ongoing() => {
            Ok(Json(serde_json::json!({
                "status": "ongoing",
                "message": rejection.to_string(),
                "app_name": app,
            }))
            .into_response())
        }
        Ok(TrainingRequest::Rejected(rejection)) => {
            Err(ApiError::TooManyRequests(rejection.to_string()))
        }
        Err(e @ StudioError::StartFailed(_)) => {
            error!(app = %app, client = %client, error = %e, "training could not start");
            Err(ApiError::Internal(e.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn lda_page(
    State(state): State<SharedState>,
    Path(app): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let app = parse_app(&app)?;
    let page = tokio::task::spawn_blocking(move || build_lda_page(&state.coordinator, &app))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(page))
}

async fn global_progress(
    State(state): State<SharedState>,
    Query(query): Query<AppQuery>,
) -> Result<Json<ProgressRecord>, ApiError> {
    let app = query.app.as_deref().map(parse_app).transpose()?;
    Ok(Json(state.coordinator.progress(app.as_ref())))
}

async fn app_progress(
    State(state): State<SharedState>,
    Path(app): Path<String>,
) -> Result<Json<ProgressRecord>, ApiError> {
    let app = parse_app(&app)?;
    Ok(Json(state.coordinator.progress(Some(&app))))
}

/// The app comes from a JSON body `{"app": ..}`, else from `?app=`, else
/// every running job is cancelled.
async fn cancel_from_body(
    State(state): State<SharedState>,
    Query(query): Query<AppQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let from_body = serde_json::from_slice::<AppQuery>(&body)
        .ok()
        .and_then(|q| q.app);
    let app = from_body
        .or(query.app)
        .as_deref()
        .map(parse_app)
        .transpose()?;
    cancel(&state, app)
}

async fn cancel_app(
    State(state): State<SharedState>,
    Path(app): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let app = parse_app(&app)?;
    cancel(&state, Some(app))
}

fn cancel(state: &SharedState, app: Option<AppId>) -> Result<Json<serde_json::Value>, ApiError> {
    let targets = state.coordinator.cancel(app.as_ref())?;
    Ok(Json(serde_json::json!({
        "status": "cancelled",
        "app_name": app,
        "apps": targets,
    })))
}

async fn training_status(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.coordinator.status()?))
}

async fn cleanup_data(
    State(state): State<SharedState>,
    Path(app): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let app = parse_app(&app)?;
    let deleted = state
        .coordinator
        .purge(&app)
        .map_err(|e| ApiError::Internal(format!("Error menghapus data: {}", e)))?;
    info!(app = %app, files = deleted.len(), "cleanup requested");
    Ok(Json(serde_json::json!({
        "status": "success",
        "message": format!("Data lama untuk {} berhasil dihapus", app),
        "deleted_files": deleted,
    })))
}
