//! HTTP routes for the server.

use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use markerd_core::{CoreError, Document, HistoryEntry};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::error;

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        // ===================
        // Current document
        // ===================
        .route("/markers.json", get(markers_get))
        .route("/save-markers", post(markers_save))
        // ===================
        // Backups
        // ===================
        .route("/backups", get(backups_names))
        .route("/list-backups", get(backups_list))
        .route("/load-backup/{id}", get(backup_load))
        .route("/restore-backup", post(backup_restore))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// =============================================================================
// Response types
// =============================================================================

/// API error response.
#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
    code: String,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

impl ApiError {
    fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }

    fn bad_request(msg: impl Into<String>) -> (StatusCode, Json<Self>) {
        (StatusCode::BAD_REQUEST, Json(Self::new(msg, "BAD_REQUEST")))
    }

    fn from_core(err: CoreError) -> (StatusCode, Json<Self>) {
        if err.is_not_found() {
            (StatusCode::NOT_FOUND, Json(Self::new(err.to_string(), "NOT_FOUND")))
        } else if err.is_corrupt() {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(Self::new(err.to_string(), "CORRUPT")),
            )
        } else {
            error!("Request failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Self::new(err.to_string(), "INTERNAL_ERROR")),
            )
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "healthy": true,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// The current markers; an empty list before the first save.
async fn markers_get(State(state): State<AppState>) -> ApiResult<Json<Document>> {
    let document = state.manager.current().await.map_err(ApiError::from_core)?;
    Ok(Json(document.unwrap_or_default()))
}

async fn markers_save(
    State(state): State<AppState>,
    body: Result<Json<Document>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(document) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let outcome = state
        .manager
        .save(document)
        .await
        .map_err(ApiError::from_core)?;
    Ok(Json(outcome))
}

/// Backup file names, newest first.
async fn backups_names(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    let names = state
        .manager
        .snapshot_names()
        .await
        .map_err(ApiError::from_core)?;
    Ok(Json(names))
}

#[derive(Debug, Serialize)]
struct BackupListResponse {
    backups: Vec<HistoryEntry>,
}

/// Backups with record counts and diffs, newest first.
async fn backups_list(State(state): State<AppState>) -> ApiResult<Json<BackupListResponse>> {
    let backups = state
        .manager
        .list_history()
        .await
        .map_err(ApiError::from_core)?;
    Ok(Json(BackupListResponse { backups }))
}

async fn backup_load(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Document>> {
    let document = state
        .manager
        .read_snapshot(&id)
        .await
        .map_err(ApiError::from_core)?;
    Ok(Json(document))
}

#[derive(Debug, Deserialize)]
struct RestoreRequest {
    #[serde(alias = "id")]
    filename: String,
}

async fn backup_restore(
    State(state): State<AppState>,
    body: Result<Json<RestoreRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let outcome = state
        .manager
        .restore(&req.filename)
        .await
        .map_err(ApiError::from_core)?;
    Ok(Json(outcome))
}
