use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::app::{AppState, HasResourceStore};
use crate::database::models::FixedResource;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Bypass the cache and reload from the database.
    #[serde(default)]
    pub refresh: bool,
}

/// GET /api/{blogs,leads,contacts,tasks}
pub async fn list<T: FixedResource>(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<T>>
where
    AppState: HasResourceStore<T>,
{
    Ok(ApiResponse::success(state.resource_store().fetch_all(query.refresh).await?))
}

/// POST /api/{blogs,leads,contacts,tasks}
pub async fn create<T: FixedResource>(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<Map<String, Value>>,
) -> ApiResult<T>
where
    AppState: HasResourceStore<T>,
{
    Ok(ApiResponse::created(state.resource_store().insert(payload).await?))
}

/// GET /api/{blogs,leads,contacts,tasks}/:id
pub async fn get<T: FixedResource>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<T>
where
    AppState: HasResourceStore<T>,
{
    Ok(ApiResponse::success(state.resource_store().fetch_by_id(id).await?))
}

/// PUT /api/{blogs,leads,contacts,tasks}/:id
pub async fn update<T: FixedResource>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    axum::Json(payload): axum::Json<Map<String, Value>>,
) -> ApiResult<T>
where
    AppState: HasResourceStore<T>,
{
    Ok(ApiResponse::success(state.resource_store().update(id, payload).await?))
}

/// DELETE /api/{blogs,leads,contacts,tasks}/:id
pub async fn delete<T: FixedResource>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Value>
where
    AppState: HasResourceStore<T>,
{
    <AppState as HasResourceStore<T>>::resource_store(&state).delete(id).await?;
    Ok(ApiResponse::success(json!({ "deleted": true })))
}
