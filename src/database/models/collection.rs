use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Tenant-defined resource-type descriptor. Slug is unique within an
/// organization; position drives display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_hidden: bool,
    pub position: i32,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a collection; the owning organization id is attached
/// by the store from the current session.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCollection {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub position: i32,
}
