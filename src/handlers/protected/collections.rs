use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::models::{Collection, NewCollection};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/collections - All collections for the current organization.
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Collection>> {
    Ok(ApiResponse::success(state.collections.fetch_for_current_org().await?))
}

/// POST /api/collections
pub async fn create(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<NewCollection>,
) -> ApiResult<Collection> {
    Ok(ApiResponse::created(state.collections.add(body).await?))
}

/// GET /api/collections/:slug - Collection plus its content count.
pub async fn get(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Value> {
    let collection = state
        .collections
        .fetch_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Collection '{}' not found", slug)))?;
    let content_count = state.collections.content_count(collection.id).await?;

    Ok(ApiResponse::success(json!({
        "collection": collection,
        "content_count": content_count,
    })))
}

/// PUT /api/collections/:slug
pub async fn update(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    axum::Json(body): axum::Json<NewCollection>,
) -> ApiResult<Collection> {
    let collection = resolve(&state, &slug).await?;
    Ok(ApiResponse::success(state.collections.update(collection.id, body).await?))
}

/// DELETE /api/collections/:slug - Removes the collection with its fields
/// and content.
pub async fn delete(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Value> {
    let collection = resolve(&state, &slug).await?;
    state.collections.delete(collection.id).await?;
    state.fields.clear().await;
    state.content.reset().await;
    Ok(ApiResponse::success(json!({ "deleted": true })))
}

/// PATCH /api/collections/:slug/visibility
pub async fn toggle_visibility(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Collection> {
    let collection = resolve(&state, &slug).await?;
    Ok(ApiResponse::success(state.collections.toggle_visibility(collection.id).await?))
}

#[derive(Debug, Deserialize)]
pub struct PositionEntry {
    pub id: i64,
    pub position: i32,
}

/// PUT /api/collections/positions - Bulk reorder, all-or-nothing.
pub async fn reposition(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<Vec<PositionEntry>>,
) -> ApiResult<Value> {
    let positions: Vec<(i64, i32)> = body.iter().map(|e| (e.id, e.position)).collect();
    state.collections.reposition(&positions).await?;
    Ok(ApiResponse::success(json!({ "repositioned": positions.len() })))
}

async fn resolve(state: &AppState, slug: &str) -> Result<Collection, ApiError> {
    state
        .collections
        .fetch_by_slug(slug)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Collection '{}' not found", slug)))
}
