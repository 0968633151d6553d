use axum::extract::{Path, State};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::notify::Notification;

/// GET /api/notifications - Active, non-expired messages in arrival order.
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Notification>> {
    Ok(ApiResponse::success(state.ctx.notifier.active()))
}

/// DELETE /api/notifications/:id - Dismiss one message.
pub async fn dismiss(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<Value> {
    state.ctx.notifier.remove(id);
    Ok(ApiResponse::success(json!({ "removed": id })))
}
