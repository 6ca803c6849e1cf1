pub mod api;
pub mod cli;
pub mod config;
pub mod detect;
pub mod webdav;

pub use api::ApiState;

use axum::{routing::get, Json, Router};
use tower_http::cors::CorsLayer;

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(api::router(state))
        .layer(CorsLayer::permissive())
}
