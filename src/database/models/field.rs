use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgTypeInfo, PgValueRef};
use sqlx::FromRow;

/// Type tag for one collection attribute. Stored as text in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Select,
    Boolean,
    Date,
}

impl FieldType {
    /// Unrecognized tags degrade to plain text rather than failing the row.
    pub fn parse(value: &str) -> FieldType {
        match value {
            "textarea" => FieldType::Textarea,
            "number" => FieldType::Number,
            "select" => FieldType::Select,
            "boolean" => FieldType::Boolean,
            "date" => FieldType::Date,
            _ => FieldType::Text,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Number => "number",
            FieldType::Select => "select",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for FieldType {
    fn type_info() -> PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for FieldType {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(FieldType::parse(s))
    }
}

/// One (value, label) choice pair; only meaningful when the field type is
/// `select`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

/// One typed attribute definition belonging to a collection.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Field {
    pub id: i64,
    pub collection_id: i64,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub is_required: bool,
    /// Display/edit order; rows missing a position sort with the fallback 0.
    pub position: Option<i32>,
    pub options: Option<sqlx::types::Json<Vec<FieldOption>>>,
}

impl Field {
    pub fn position_or_default(&self) -> i32 {
        self.position.unwrap_or(0)
    }

    pub fn choices(&self) -> &[FieldOption] {
        match &self.options {
            Some(options) => &options.0,
            None => &[],
        }
    }
}

/// Payload for creating a field on a collection.
#[derive(Debug, Clone, Deserialize)]
pub struct NewField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub options: Option<Vec<FieldOption>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_tags_degrade_to_text() {
        assert_eq!(FieldType::parse("select"), FieldType::Select);
        assert_eq!(FieldType::parse("markdown"), FieldType::Text);
        assert_eq!(FieldType::parse(""), FieldType::Text);
    }

    #[test]
    fn missing_position_sorts_with_fallback() {
        let field = Field {
            id: 1,
            collection_id: 1,
            name: "headline".to_string(),
            field_type: FieldType::Text,
            is_required: true,
            position: None,
            options: None,
        };
        assert_eq!(field.position_or_default(), 0);
    }
}
