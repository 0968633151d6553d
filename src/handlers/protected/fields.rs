use axum::extract::{Path, State};

use crate::app::AppState;
use crate::database::models::{Field, NewField};
use crate::middleware::{ApiResponse, ApiResult};
use crate::store::fields::FieldUpdate;

/// GET /api/collections/:slug/fields
pub async fn list(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Vec<Field>> {
    Ok(ApiResponse::success(state.fields.fetch_for_collection(&slug).await?))
}

/// POST /api/collections/:slug/fields - Add fields to the schema.
pub async fn create(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    axum::Json(body): axum::Json<Vec<NewField>>,
) -> ApiResult<Vec<Field>> {
    Ok(ApiResponse::created(state.fields.add_fields(&slug, body).await?))
}

/// PUT /api/collections/:slug/fields - Rewrite existing definitions in bulk.
pub async fn update(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    axum::Json(body): axum::Json<Vec<FieldUpdate>>,
) -> ApiResult<Vec<Field>> {
    Ok(ApiResponse::success(state.fields.update_fields(&slug, body).await?))
}
