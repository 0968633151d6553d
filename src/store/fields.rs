use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::auth::Capability;
use crate::database::models::{Collection, Field, FieldOption, FieldType, NewField};
use crate::database::query::SqlParam;
use crate::database::repository::Repository;
use crate::store::{AppContext, StoreError};

/// An existing field with its editable attributes, as submitted by a bulk
/// edit of a collection's schema.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldUpdate {
    pub id: i64,
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

/// Field definitions per collection, cached by collection id.
pub struct FieldStore {
    ctx: AppContext,
    cache: RwLock<HashMap<i64, Vec<Field>>>,
}

impl FieldStore {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx, cache: RwLock::new(HashMap::new()) }
    }

    fn repo(&self) -> Repository<Field> {
        Repository::new("fields", self.ctx.pool.clone())
    }

    async fn resolve_collection(&self, slug: &str) -> Result<Collection, StoreError> {
        let organization_id = self.ctx.require_organization().await?;
        let collections: Repository<Collection> =
            Repository::new("collections", self.ctx.pool.clone());
        collections
            .select_optional(&[
                ("slug", SqlParam::Text(slug.to_string())),
                ("organization_id", SqlParam::Uuid(organization_id)),
            ])
            .await?
            .ok_or_else(|| StoreError::NotFound("Collection".to_string()))
    }

    /// The collection's fields in display order; rows without a position sort
    /// first with the fallback 0.
    pub async fn fetch_for_collection(&self, slug: &str) -> Result<Vec<Field>, StoreError> {
        self.ctx.require_capability(Capability::View).await?;
        let collection = self.resolve_collection(slug).await?;
        self.fetch_for_collection_id(collection.id).await
    }

    pub(crate) async fn fetch_for_collection_id(
        &self,
        collection_id: i64,
    ) -> Result<Vec<Field>, StoreError> {
        if let Some(fields) = self.cache.read().await.get(&collection_id) {
            return Ok(fields.clone());
        }

        let mut fields = self
            .repo()
            .select_any(&[("collection_id", SqlParam::Int(collection_id))], None)
            .await?;
        fields.sort_by_key(Field::position_or_default);

        self.cache.write().await.insert(collection_id, fields.clone());
        Ok(fields)
    }

    pub async fn add_fields(
        &self,
        slug: &str,
        new_fields: Vec<NewField>,
    ) -> Result<Vec<Field>, StoreError> {
        self.ctx.require_capability(Capability::AddFields).await?;
        let collection = self.resolve_collection(slug).await?;

        for field in &new_fields {
            if field.name.trim().is_empty() {
                return Err(StoreError::Validation("Field name is required".to_string()));
            }
        }

        let mut created = Vec::with_capacity(new_fields.len());
        for (index, field) in new_fields.into_iter().enumerate() {
            let position = field.position.unwrap_or(index as i32);
            let row = vec![
                ("collection_id".to_string(), SqlParam::Int(collection.id)),
                ("name".to_string(), SqlParam::Text(field.name)),
                ("type".to_string(), SqlParam::Text(field.field_type.as_str().to_string())),
                ("is_required".to_string(), SqlParam::Bool(field.is_required)),
                ("position".to_string(), SqlParam::Int(position as i64)),
                ("options".to_string(), options_param(field.field_type, field.options)),
            ];
            created.push(self.repo().insert_returning(row).await?);
        }

        self.cache.write().await.remove(&collection.id);
        Ok(created)
    }

    /// Rewrite existing field definitions as one bulk upsert.
    pub async fn update_fields(
        &self,
        slug: &str,
        updates: Vec<FieldUpdate>,
    ) -> Result<Vec<Field>, StoreError> {
        self.ctx.require_capability(Capability::Edit).await?;
        let collection = self.resolve_collection(slug).await?;

        if !updates.is_empty() {
            let rows = updates
                .into_iter()
                .map(|update| {
                    vec![
                        ("id".to_string(), SqlParam::Int(update.id)),
                        ("collection_id".to_string(), SqlParam::Int(collection.id)),
                        ("name".to_string(), SqlParam::Text(update.name)),
                        (
                            "type".to_string(),
                            SqlParam::Text(update.field_type.as_str().to_string()),
                        ),
                        ("is_required".to_string(), SqlParam::Bool(update.is_required)),
                        ("position".to_string(), update.position.into()),
                        (
                            "options".to_string(),
                            options_param(update.field_type, update.options),
                        ),
                    ]
                })
                .collect();
            self.repo().upsert_many(rows, "id").await?;
        }

        self.cache.write().await.remove(&collection.id);
        self.fetch_for_collection_id(collection.id).await
    }

    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    #[cfg(test)]
    pub(crate) async fn seed_cache(&self, collection_id: i64, fields: Vec<Field>) {
        self.cache.write().await.insert(collection_id, fields);
    }
}

/// Choice lists are only meaningful on select fields; other types store NULL.
fn options_param(field_type: FieldType, options: Option<Vec<FieldOption>>) -> SqlParam {
    match (field_type, options) {
        (FieldType::Select, Some(options)) => match serde_json::to_value(options) {
            Ok(value) => SqlParam::Json(value),
            Err(_) => SqlParam::Null,
        },
        _ => SqlParam::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::store::test_support::offline_context;
    use uuid::Uuid;

    fn field(id: i64, name: &str, position: Option<i32>) -> Field {
        Field {
            id,
            collection_id: 1,
            name: name.to_string(),
            field_type: FieldType::Text,
            is_required: false,
            position,
            options: None,
        }
    }

    #[tokio::test]
    async fn cached_fields_are_returned_without_a_query() {
        let ctx = offline_context(Role::Admin, Some(Uuid::new_v4())).await;
        let store = FieldStore::new(ctx);
        store.seed_cache(1, vec![field(10, "title", Some(0))]).await;

        let fields = store.fetch_for_collection_id(1).await.unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "title");
    }

    #[tokio::test]
    async fn unknown_role_cannot_read_fields() {
        let ctx = offline_context(Role::None, Some(Uuid::new_v4())).await;
        let store = FieldStore::new(ctx.clone());
        store.seed_cache(1, vec![field(10, "title", Some(0))]).await;

        let err = store.fetch_for_collection("news").await.unwrap_err();
        assert!(matches!(err, StoreError::Denied("view")));
        assert_eq!(ctx.notifier.active().len(), 1);
    }

    #[tokio::test]
    async fn viewer_cannot_add_fields() {
        let ctx = offline_context(Role::Viewer, Some(Uuid::new_v4())).await;
        let store = FieldStore::new(ctx);

        let err = store
            .add_fields(
                "news",
                vec![NewField {
                    name: "title".to_string(),
                    field_type: FieldType::Text,
                    is_required: true,
                    position: None,
                    options: None,
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Denied(_)));
    }

    #[test]
    fn options_are_dropped_for_non_select_fields() {
        let options = vec![FieldOption { value: "a".to_string(), label: "A".to_string() }];
        assert_eq!(options_param(FieldType::Text, Some(options.clone())), SqlParam::Null);
        assert!(matches!(
            options_param(FieldType::Select, Some(options)),
            SqlParam::Json(_)
        ));
        assert_eq!(options_param(FieldType::Select, None), SqlParam::Null);
    }
}
