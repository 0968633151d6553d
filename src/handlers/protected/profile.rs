use axum::extract::State;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::session::{ProfileUpdate, Session};

/// PUT /api/profile - Name, email, and password updated independently; the
/// outcome of each attempt lands in the notification queue.
pub async fn save(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<ProfileUpdate>,
) -> ApiResult<Session> {
    state.ctx.session.save_profile(body).await;
    Ok(ApiResponse::success(state.ctx.session.snapshot().await))
}

/// POST /api/profile/theme - Flip dark mode; the flip sticks even when the
/// persistence write fails.
pub async fn toggle_theme(State(state): State<AppState>) -> ApiResult<Value> {
    let theme = state.ctx.session.toggle_dark_mode().await;
    Ok(ApiResponse::success(json!({ "theme": theme })))
}
