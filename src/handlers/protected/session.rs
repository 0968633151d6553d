use axum::extract::State;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::session::Session;

/// GET /auth/session - The current session snapshot.
pub async fn get(State(state): State<AppState>) -> ApiResult<Session> {
    Ok(ApiResponse::success(state.ctx.session.snapshot().await))
}

/// DELETE /auth/session - Log out. Always clears local state; remote
/// sign-out failures are reported through notifications, not status codes.
pub async fn logout(State(state): State<AppState>) -> ApiResult<Value> {
    state.ctx.session.logout().await;
    state.clear_caches().await;
    Ok(ApiResponse::success(json!({ "logged_out": true })))
}
