use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::query::SqlParam;

/// A flat, independently persisted record type served by the generic
/// resource store. Each implementor names its table, the fields a create
/// payload must carry, and how a raw JSON payload maps onto insert columns.
pub trait FixedResource:
    for<'r> FromRow<'r, PgRow> + Serialize + Clone + Send + Sync + Unpin + 'static
{
    const TABLE: &'static str;
    /// Resource name used in notifications and error messages.
    const NOUN: &'static str;
    const REQUIRED_FIELDS: &'static [&'static str];
    /// Columns a client may set on create/update, in table order.
    const WRITABLE_COLUMNS: &'static [&'static str];

    fn id(&self) -> i64;
}

/// Convert the writable subset of a JSON payload into typed insert columns.
/// Unknown keys are ignored; presence of required keys is checked by the
/// store before this runs.
pub fn writable_columns<T: FixedResource>(
    payload: &serde_json::Map<String, Value>,
) -> Vec<(String, SqlParam)> {
    let mut columns = Vec::new();
    for column in T::WRITABLE_COLUMNS {
        if let Some(value) = payload.get(*column) {
            let param = match value {
                Value::Null => SqlParam::Null,
                Value::Bool(b) => SqlParam::Bool(*b),
                Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        SqlParam::Int(i)
                    } else {
                        SqlParam::Float(n.as_f64().unwrap_or_default())
                    }
                }
                Value::String(s) => SqlParam::Text(s.clone()),
                other => SqlParam::Json(other.clone()),
            };
            columns.push((column.to_string(), param));
        }
    }
    columns
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Blog {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub content: String,
    pub tags: Option<String>,
    pub slug: String,
    pub status: String,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FixedResource for Blog {
    const TABLE: &'static str = "blogs";
    const NOUN: &'static str = "blog";
    const REQUIRED_FIELDS: &'static [&'static str] = &["title", "content", "slug"];
    const WRITABLE_COLUMNS: &'static [&'static str] =
        &["title", "description", "category", "content", "tags", "slug", "status"];

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Lead {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub interest: Option<String>,
    pub organization_id: Uuid,
    pub submitted_at: DateTime<Utc>,
}

impl FixedResource for Lead {
    const TABLE: &'static str = "leads";
    const NOUN: &'static str = "lead";
    const REQUIRED_FIELDS: &'static [&'static str] = &["name"];
    const WRITABLE_COLUMNS: &'static [&'static str] = &["name", "email", "interest"];

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub user_id: Option<Uuid>,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FixedResource for Contact {
    const TABLE: &'static str = "contacts";
    const NOUN: &'static str = "contact";
    const REQUIRED_FIELDS: &'static [&'static str] = &["name", "email"];
    const WRITABLE_COLUMNS: &'static [&'static str] =
        &["name", "email", "phone", "address", "company", "notes"];

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
    pub priority: Option<String>,
    pub user_id: Option<Uuid>,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FixedResource for Task {
    const TABLE: &'static str = "tasks";
    const NOUN: &'static str = "task";
    const REQUIRED_FIELDS: &'static [&'static str] = &["title"];
    const WRITABLE_COLUMNS: &'static [&'static str] =
        &["title", "description", "assigned_to", "due_date", "completed", "priority"];

    fn id(&self) -> i64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writable_columns_ignores_unknown_keys() {
        let payload = json!({
            "title": "Hello",
            "content": "Body",
            "slug": "hello",
            "id": 99,
            "organization_id": "not-allowed"
        });
        let columns = writable_columns::<Blog>(payload.as_object().unwrap());
        let names: Vec<&str> = columns.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(names, vec!["title", "content", "slug"]);
    }
}
