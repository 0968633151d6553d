use axum::extract::{Path, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/users - Members of the current organization.
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    Ok(ApiResponse::success(state.users.fetch_all().await?))
}

/// GET /api/users/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<User> {
    Ok(ApiResponse::success(state.users.fetch_by_id(id).await?))
}
