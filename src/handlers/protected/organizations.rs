use axum::extract::{Path, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Organization;
use crate::middleware::{ApiResponse, ApiResult};
use crate::store::organizations::NewOrganization;

/// GET /api/organizations
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Organization>> {
    Ok(ApiResponse::success(state.organizations.fetch_all().await?))
}

/// POST /api/organizations - Platform-operator only.
pub async fn create(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<NewOrganization>,
) -> ApiResult<Organization> {
    Ok(ApiResponse::created(state.organizations.add(body).await?))
}

/// GET /api/organizations/:id
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Organization> {
    Ok(ApiResponse::success(state.organizations.fetch_by_id(id).await?))
}
