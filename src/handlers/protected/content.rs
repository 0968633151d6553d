use axum::extract::{Path, State};
use serde_json::{json, Map, Value};

use crate::app::AppState;
use crate::database::models::ContentItem;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/collections/:slug/content - The collection, its fields, and the
/// items visible to the current user.
pub async fn list(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Value> {
    let content = state.content.fetch_for_collection(&slug).await?;
    Ok(ApiResponse::success(json!({
        "collection": content.collection,
        "fields": content.fields,
        "items": content.items,
    })))
}

/// POST /api/collections/:slug/content - Validated against the collection's
/// field definitions before anything is written.
pub async fn create(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    axum::Json(payload): axum::Json<Map<String, Value>>,
) -> ApiResult<ContentItem> {
    Ok(ApiResponse::created(state.content.add_item(&slug, payload).await?))
}

/// GET /api/collections/:slug/content/:id
pub async fn get(
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, i64)>,
) -> ApiResult<ContentItem> {
    Ok(ApiResponse::success(state.content.fetch_item(&slug, id).await?))
}

/// PUT /api/collections/:slug/content/:id
pub async fn update(
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, i64)>,
    axum::Json(payload): axum::Json<Map<String, Value>>,
) -> ApiResult<ContentItem> {
    Ok(ApiResponse::success(state.content.update_item(&slug, id, payload).await?))
}
