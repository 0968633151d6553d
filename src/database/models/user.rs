use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

/// Profile record backing a login identity. The preferences bag is free-form
/// key/value; the dark-mode flag lives under the `darkmode` key.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub preferences: Option<sqlx::types::Json<Map<String, Value>>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn preferences_map(&self) -> Map<String, Value> {
        self.preferences.as_ref().map(|p| p.0.clone()).unwrap_or_default()
    }
}
