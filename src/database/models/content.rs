use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

use super::field::{Field, FieldType};

/// One record conforming to a collection's fields. The payload keys are the
/// collection's field names; values are validated before they ever reach the
/// database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContentItem {
    pub id: i64,
    pub collection_id: i64,
    pub organization_id: Uuid,
    /// The creating user; restricted roles only ever see their own rows.
    pub user_id: Option<Uuid>,
    pub data: sqlx::types::Json<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A payload value checked against its declared field type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    Select(String),
}

impl FieldValue {
    /// Parse a raw JSON value against a field definition. Select values must
    /// be one of the declared choices.
    pub fn from_json(field: &Field, value: &Value) -> Result<FieldValue, String> {
        match field.field_type {
            FieldType::Text | FieldType::Textarea => match value.as_str() {
                Some(s) => Ok(FieldValue::Text(s.to_string())),
                None => Err(format!("'{}' must be a string", field.name)),
            },
            FieldType::Number => match value.as_f64() {
                Some(n) => Ok(FieldValue::Number(n)),
                None => Err(format!("'{}' must be a number", field.name)),
            },
            FieldType::Boolean => match value.as_bool() {
                Some(b) => Ok(FieldValue::Boolean(b)),
                None => Err(format!("'{}' must be true or false", field.name)),
            },
            FieldType::Date => match value.as_str().and_then(|s| s.parse::<NaiveDate>().ok()) {
                Some(d) => Ok(FieldValue::Date(d)),
                None => Err(format!("'{}' must be a date in YYYY-MM-DD format", field.name)),
            },
            FieldType::Select => {
                let choice = value
                    .as_str()
                    .ok_or_else(|| format!("'{}' must be a string", field.name))?;
                if field.choices().iter().any(|o| o.value == choice) {
                    Ok(FieldValue::Select(choice.to_string()))
                } else {
                    Err(format!("'{}' is not a valid choice for '{}'", choice, field.name))
                }
            }
        }
    }

    pub fn into_json(self) -> Value {
        match self {
            FieldValue::Text(s) | FieldValue::Select(s) => Value::String(s),
            FieldValue::Number(n) => {
                serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
            }
            FieldValue::Boolean(b) => Value::Bool(b),
            FieldValue::Date(d) => Value::String(d.to_string()),
        }
    }
}

/// Validate a content payload against a collection's declared fields.
/// Unknown keys are rejected, required fields must be present and non-null,
/// every value must match its field type. Returns the normalized payload.
pub fn validate_payload(
    fields: &[Field],
    payload: &Map<String, Value>,
) -> Result<Map<String, Value>, Vec<String>> {
    let mut errors = Vec::new();
    let mut normalized = Map::new();

    for key in payload.keys() {
        if !fields.iter().any(|f| f.name == *key) {
            errors.push(format!("unknown field '{}'", key));
        }
    }

    for field in fields {
        match payload.get(&field.name) {
            Some(Value::Null) | None => {
                if field.is_required {
                    errors.push(format!("'{}' is required", field.name));
                }
            }
            Some(value) => match FieldValue::from_json(field, value) {
                Ok(parsed) => {
                    normalized.insert(field.name.clone(), parsed.into_json());
                }
                Err(message) => errors.push(message),
            },
        }
    }

    if errors.is_empty() {
        Ok(normalized)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::field::FieldOption;
    use serde_json::json;

    fn field(name: &str, field_type: FieldType, required: bool) -> Field {
        Field {
            id: 1,
            collection_id: 1,
            name: name.to_string(),
            field_type,
            is_required: required,
            position: Some(0),
            options: None,
        }
    }

    #[test]
    fn accepts_a_valid_payload() {
        let fields = vec![
            field("title", FieldType::Text, true),
            field("published", FieldType::Boolean, false),
            field("launch_date", FieldType::Date, false),
        ];
        let payload = json!({
            "title": "Hello",
            "published": true,
            "launch_date": "2025-03-01"
        });

        let normalized = validate_payload(&fields, payload.as_object().unwrap()).unwrap();
        assert_eq!(normalized.get("title"), Some(&json!("Hello")));
        assert_eq!(normalized.get("launch_date"), Some(&json!("2025-03-01")));
    }

    #[test]
    fn rejects_unknown_keys() {
        let fields = vec![field("title", FieldType::Text, true)];
        let payload = json!({ "title": "ok", "rogue": 1 });

        let errors = validate_payload(&fields, payload.as_object().unwrap()).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("unknown field 'rogue'")));
    }

    #[test]
    fn rejects_missing_required_and_type_mismatches() {
        let fields = vec![
            field("title", FieldType::Text, true),
            field("count", FieldType::Number, false),
        ];
        let payload = json!({ "count": "twelve" });

        let errors = validate_payload(&fields, payload.as_object().unwrap()).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("'title' is required")));
        assert!(errors.iter().any(|e| e.contains("'count' must be a number")));
    }

    #[test]
    fn select_values_must_match_declared_choices() {
        let mut select = field("status", FieldType::Select, true);
        select.options = Some(sqlx::types::Json(vec![
            FieldOption { value: "draft".to_string(), label: "Draft".to_string() },
            FieldOption { value: "published".to_string(), label: "Published".to_string() },
        ]));

        let ok = json!({ "status": "draft" });
        assert!(validate_payload(&[select.clone()], ok.as_object().unwrap()).is_ok());

        let bad = json!({ "status": "archived" });
        let errors = validate_payload(&[select], bad.as_object().unwrap()).unwrap_err();
        assert!(errors[0].contains("not a valid choice"));
    }

    #[test]
    fn optional_null_values_are_skipped() {
        let fields = vec![field("notes", FieldType::Textarea, false)];
        let payload = json!({ "notes": null });

        let normalized = validate_payload(&fields, payload.as_object().unwrap()).unwrap();
        assert!(normalized.is_empty());
    }
}
