use axum::extract::State;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// GET / - Service banner.
pub async fn root() -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

/// GET /health - Database ping; 503 while the backend is unreachable.
pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    match sqlx::query("SELECT 1").execute(&state.ctx.pool).await {
        Ok(_) => Ok(ApiResponse::success(json!({ "status": "healthy" }))),
        Err(e) => {
            tracing::warn!("health check failed: {}", e);
            Err(ApiError::service_unavailable("Database unreachable"))
        }
    }
}
