use axum::{http::StatusCode, routing::get, routing::post, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::server::handlers;
use crate::server::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/compiler/compile", post(handlers::compiler::compile))
        .route("/compiler/judge", post(handlers::compiler::judge))
        .route(
            "/compiler/judge-from-file",
            post(handlers::compiler::judge_from_file),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn version() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "service": "cjudge"
    }))
}
