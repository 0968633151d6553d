use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/login - Exchange credentials for a session token.
pub async fn login(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<LoginRequest>,
) -> ApiResult<Value> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let token = state.ctx.session.login(&body.email, &body.password).await?;
    let session = state.ctx.session.snapshot().await;

    Ok(ApiResponse::success(json!({
        "token": token,
        "session": session,
    })))
}
