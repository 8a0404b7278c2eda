mod error;

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use basemon_core::metrics::TEXT_CONTENT_TYPE;
use basemon_core::MetricRegistry;

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub registry: Arc<MetricRegistry>,
}

type SharedState = Arc<AppState>;

// ==============================================================================
// Router
// ==============================================================================

/// Read-only routes: nothing served here mutates the registry.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(Arc::new(state))
}

async fn metrics(State(state): State<SharedState>) -> Result<impl IntoResponse, error::AppError> {
    let body = state.registry.encode().await.map_err(|err| {
        tracing::error!(error = %err, "failed to encode metrics");
        error::AppError::Internal("failed to encode metrics".to_string())
    })?;
    Ok(([(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)], body))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn not_found() -> error::AppError {
    error::AppError::NotFound("route not found".to_string())
}
