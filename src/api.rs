use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::config::Config;
use crate::detect::{Detector, DirectoryChanges};
use crate::webdav::{DavFs, FileEntry};

/// Shared state behind every handler.
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<RwLock<Config>>,
    pub config_path: PathBuf,
    pub client: Arc<dyn DavFs>,
    pub detector: Arc<Detector>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/directories", get(get_directories).post(set_directories))
        .route("/diff", post(run_diff))
        .route("/ls", get(list_directory))
        .with_state(state)
}

async fn get_directories(State(state): State<ApiState>) -> Json<Vec<String>> {
    Json(state.config.read().await.directories.clone())
}

async fn set_directories(
    State(state): State<ApiState>,
    Json(directories): Json<Vec<String>>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let mut config = state.config.write().await;
    config.directories = directories;
    config.save(&state.config_path).map_err(|e| {
        error!("failed to save config: {e}");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(Json(json!({ "message": "directories updated" })))
}

#[derive(Debug, Default, Deserialize)]
struct DiffRequest {
    #[serde(default, rename = "include-hidden")]
    include_hidden: bool,
    #[serde(default)]
    paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DiffQuery {
    path: Option<String>,
    #[serde(rename = "include-hidden")]
    include_hidden: Option<bool>,
}

/// POST /diff - detect changes since the previous detection.
///
/// Watch roots come from the `path` query parameter, then the request body,
/// then the configured directories, in that order.
async fn run_diff(
    State(state): State<ApiState>,
    Query(query): Query<DiffQuery>,
    body: Option<Json<DiffRequest>>,
) -> Result<Json<Vec<DirectoryChanges>>, (StatusCode, String)> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let include_hidden = query.include_hidden.unwrap_or(request.include_hidden);

    let directories = if let Some(path) = query.path.filter(|p| !p.is_empty()) {
        vec![path]
    } else if !request.paths.is_empty() {
        request.paths
    } else {
        let configured = state.config.read().await.directories.clone();
        if configured.is_empty() {
            return Err((
                StatusCode::BAD_REQUEST,
                "no directories specified; pass a `path` query parameter, `paths` in the \
                 request body, or configure directories"
                    .to_string(),
            ));
        }
        configured
    };

    let started = Instant::now();
    let results = state
        .detector
        .detect(&directories, include_hidden)
        .await
        .map_err(|e| {
            error!("change detection failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to detect changes: {e}"),
            )
        })?;

    let total: usize = results.iter().map(|r| r.changes.len()).sum();
    info!(
        directories = results.len(),
        changes = total,
        elapsed = ?started.elapsed(),
        "diff completed"
    );
    Ok(Json(results))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    path: Option<String>,
    #[serde(default, rename = "include-hidden")]
    include_hidden: bool,
}

#[derive(Serialize)]
struct ListResponse {
    path: String,
    files: Vec<FileEntry>,
    include_hidden: bool,
}

/// GET /ls - one-level listing of a remote directory.
async fn list_directory(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, (StatusCode, String)> {
    let path = query
        .path
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "/".to_string());

    let files = state
        .client
        .list_children(&path, query.include_hidden)
        .await
        .map_err(|e| {
            error!(%path, "failed to list directory: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to list directory: {e}"),
            )
        })?;

    Ok(Json(ListResponse {
        path,
        files,
        include_hidden: query.include_hidden,
    }))
}
