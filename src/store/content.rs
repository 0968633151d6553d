use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use uuid::Uuid;

use crate::auth::Capability;
use crate::database::models::{validate_payload, Collection, ContentItem, Field};
use crate::database::query::SqlParam;
use crate::database::repository::Repository;
use crate::store::{AppContext, StoreError};

/// Everything loaded for one collection: the collection row, its field
/// definitions, and the content items visible to the current user.
#[derive(Clone, Debug)]
pub struct CollectionContent {
    pub collection: Collection,
    pub fields: Vec<Field>,
    pub items: Vec<ContentItem>,
}

/// Content per collection slug. Loads are deduplicated per slug: while a
/// fetch for a slug is in flight, concurrent callers for the same slug wait
/// on its gate and are answered from the freshly filled cache.
pub struct ContentStore {
    ctx: AppContext,
    cache: RwLock<HashMap<String, CollectionContent>>,
    loaders: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ContentStore {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            cache: RwLock::new(HashMap::new()),
            loaders: Mutex::new(HashMap::new()),
        }
    }

    fn items_repo(&self) -> Repository<ContentItem> {
        Repository::new("content_items", self.ctx.pool.clone())
    }

    fn loader_gate(&self, slug: &str) -> Arc<AsyncMutex<()>> {
        let mut gates = self.loaders.lock().unwrap_or_else(|e| e.into_inner());
        gates.entry(slug.to_string()).or_default().clone()
    }

    /// A cache hit only counts when the entry was loaded for the session's
    /// current organization; entries left over from another one are ignored.
    async fn cached_for(&self, slug: &str, organization_id: Uuid) -> Option<CollectionContent> {
        self.cache
            .read()
            .await
            .get(slug)
            .filter(|content| content.collection.organization_id == organization_id)
            .cloned()
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

    /// Load a collection with its fields and items. Cached per slug;
    /// restricted roles only receive rows they created.
    pub async fn fetch_for_collection(
        &self,
        slug: &str,
    ) -> Result<CollectionContent, StoreError> {
        self.ctx.require_capability(Capability::View).await?;
        let organization_id = self.ctx.require_organization().await?;

        if let Some(content) = self.cached_for(slug, organization_id).await {
            return Ok(content);
        }

        // One load per slug at a time. Late callers wait on the gate and
        // usually find the cache filled once they acquire it.
        let gate = self.loader_gate(slug);
        let _guard = gate.lock().await;

        if let Some(content) = self.cached_for(slug, organization_id).await {
            return Ok(content);
        }

        let content = self.load(slug).await?;
        self.cache.write().await.insert(slug.to_string(), content.clone());
        Ok(content)
    }

    async fn load(&self, slug: &str) -> Result<CollectionContent, StoreError> {
        let collection = self.resolve_collection(slug).await?;
        let organization_id = self.ctx.require_organization().await?;

        let fields_repo: Repository<Field> = Repository::new("fields", self.ctx.pool.clone());
        let mut fields = fields_repo
            .select_any(&[("collection_id", SqlParam::Int(collection.id))], None)
            .await?;
        fields.sort_by_key(Field::position_or_default);

        let mut filters = vec![
            ("collection_id", SqlParam::Int(collection.id)),
            ("organization_id", SqlParam::Uuid(organization_id)),
        ];
        if self.ctx.ownership_scoped().await {
            match self.ctx.session.user_id().await {
                Some(user_id) => filters.push(("user_id", SqlParam::Uuid(user_id))),
                None => {
                    return Err(StoreError::Validation(
                        "No user on the current session".to_string(),
                    ))
                }
            }
        }
        let items = self
            .items_repo()
            .select_any(&filters, Some(("created_at", false)))
            .await?;

        Ok(CollectionContent { collection, fields, items })
    }

    pub async fn fetch_item(&self, slug: &str, id: i64) -> Result<ContentItem, StoreError> {
        let content = self.fetch_for_collection(slug).await?;
        content
            .items
            .into_iter()
            .find(|item| item.id == id)
            .ok_or_else(|| StoreError::NotFound("Content item".to_string()))
    }

    pub async fn add_item(
        &self,
        slug: &str,
        payload: Map<String, Value>,
    ) -> Result<ContentItem, StoreError> {
        self.ctx.require_capability(Capability::AddContent).await?;
        let organization_id = self.ctx.require_organization().await?;
        let collection = self.resolve_collection(slug).await?;

        let fields = self.collection_fields(collection.id).await?;
        let normalized = validate_payload(&fields, &payload)
            .map_err(|errors| StoreError::Validation(errors.join("; ")))?;

        let created = self
            .items_repo()
            .insert_returning(vec![
                ("collection_id".to_string(), SqlParam::Int(collection.id)),
                ("organization_id".to_string(), SqlParam::Uuid(organization_id)),
                ("user_id".to_string(), self.ctx.session.user_id().await.into()),
                ("data".to_string(), SqlParam::Json(Value::Object(normalized))),
            ])
            .await?;

        if let Some(content) = self.cache.write().await.get_mut(slug) {
            content.items.insert(0, created.clone());
        }
        Ok(created)
    }

    pub async fn update_item(
        &self,
        slug: &str,
        id: i64,
        payload: Map<String, Value>,
    ) -> Result<ContentItem, StoreError> {
        self.ctx.require_capability(Capability::Edit).await?;
        let organization_id = self.ctx.require_organization().await?;
        let collection = self.resolve_collection(slug).await?;

        let fields = self.collection_fields(collection.id).await?;
        let normalized = validate_payload(&fields, &payload)
            .map_err(|errors| StoreError::Validation(errors.join("; ")))?;

        let updated = self
            .items_repo()
            .update_returning(
                vec![
                    ("data".to_string(), SqlParam::Json(Value::Object(normalized))),
                    ("updated_at".to_string(), SqlParam::Timestamp(Utc::now())),
                ],
                &[
                    ("id", SqlParam::Int(id)),
                    ("collection_id", SqlParam::Int(collection.id)),
                    ("organization_id", SqlParam::Uuid(organization_id)),
                ],
            )
            .await
            .map_err(|err| match err {
                crate::database::manager::DatabaseError::NotFound(_) => {
                    StoreError::NotFound("Content item".to_string())
                }
                other => StoreError::Database(other),
            })?;

        // Replace exactly the matching cache entry.
        if let Some(content) = self.cache.write().await.get_mut(slug) {
            if let Some(slot) = content.items.iter_mut().find(|item| item.id == id) {
                *slot = updated.clone();
            }
        }
        Ok(updated)
    }

    async fn collection_fields(&self, collection_id: i64) -> Result<Vec<Field>, StoreError> {
        let repo: Repository<Field> = Repository::new("fields", self.ctx.pool.clone());
        let mut fields = repo
            .select_any(&[("collection_id", SqlParam::Int(collection_id))], None)
            .await?;
        fields.sort_by_key(Field::position_or_default);
        Ok(fields)
    }

    pub async fn reset(&self) {
        self.cache.write().await.clear();
        self.loaders.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    #[cfg(test)]
    pub(crate) async fn seed_cache(&self, slug: &str, content: CollectionContent) {
        self.cache.write().await.insert(slug.to_string(), content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::database::models::FieldType;
    use crate::store::test_support::offline_context;
    use uuid::Uuid;

    fn collection(org: Uuid) -> Collection {
        Collection {
            id: 1,
            name: "News".to_string(),
            slug: "news".to_string(),
            description: None,
            is_hidden: false,
            position: 0,
            organization_id: org,
            created_at: Utc::now(),
        }
    }

    fn item(id: i64, org: Uuid) -> ContentItem {
        ContentItem {
            id,
            collection_id: 1,
            organization_id: org,
            user_id: None,
            data: sqlx::types::Json(Map::new()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn title_field() -> Field {
        Field {
            id: 10,
            collection_id: 1,
            name: "title".to_string(),
            field_type: FieldType::Text,
            is_required: true,
            position: Some(0),
            options: None,
        }
    }

    #[tokio::test]
    async fn cached_slug_is_served_without_a_query() {
        let org = Uuid::new_v4();
        let ctx = offline_context(Role::Admin, Some(org)).await;
        let store = ContentStore::new(ctx);
        store
            .seed_cache(
                "news",
                CollectionContent {
                    collection: collection(org),
                    fields: vec![title_field()],
                    items: vec![item(1, org), item(2, org)],
                },
            )
            .await;

        let content = store.fetch_for_collection("news").await.unwrap();
        assert_eq!(content.items.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_fetch_waits_for_the_leading_load() {
        let org = Uuid::new_v4();
        let ctx = offline_context(Role::Admin, Some(org)).await;
        let store = Arc::new(ContentStore::new(ctx));

        // Act as the leading load by holding the slug's gate.
        let gate = store.loader_gate("news");
        let guard = gate.lock().await;

        let follower = {
            let store = store.clone();
            tokio::spawn(async move { store.fetch_for_collection("news").await })
        };

        // The follower must park on the gate, not fail or start its own load.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!follower.is_finished());

        store
            .seed_cache(
                "news",
                CollectionContent {
                    collection: collection(org),
                    fields: vec![],
                    items: vec![item(1, org)],
                },
            )
            .await;
        drop(guard);

        // With the gate released and the cache filled, the follower gets the
        // completed load without ever reaching the offline backend.
        let content = follower.await.unwrap().unwrap();
        assert_eq!(content.items.len(), 1);
    }

    #[tokio::test]
    async fn cached_rows_for_another_org_are_not_served() {
        let other_org = Uuid::new_v4();
        let ctx = offline_context(Role::Admin, Some(Uuid::new_v4())).await;
        let store = ContentStore::new(ctx);
        store
            .seed_cache(
                "news",
                CollectionContent {
                    collection: collection(other_org),
                    fields: vec![],
                    items: vec![item(1, other_org)],
                },
            )
            .await;

        // The entry belongs to a different organization, so the lookup must
        // go to the backend, which is unreachable here.
        assert!(matches!(
            store.fetch_for_collection("news").await,
            Err(StoreError::Database(_))
        ));
    }

    #[tokio::test]
    async fn unknown_role_cannot_read_content() {
        let org = Uuid::new_v4();
        let ctx = offline_context(Role::None, Some(org)).await;
        let store = ContentStore::new(ctx);
        store
            .seed_cache(
                "news",
                CollectionContent {
                    collection: collection(org),
                    fields: vec![],
                    items: vec![item(1, org)],
                },
            )
            .await;

        let err = store.fetch_for_collection("news").await.unwrap_err();
        assert!(matches!(err, StoreError::Denied("view")));
    }

    #[tokio::test]
    async fn viewer_cannot_add_content() {
        let org = Uuid::new_v4();
        let ctx = offline_context(Role::Viewer, Some(org)).await;
        let store = ContentStore::new(ctx);

        let err = store.add_item("news", Map::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Denied(_)));
    }

    #[tokio::test]
    async fn editor_may_add_but_not_edit() {
        let org = Uuid::new_v4();
        let ctx = offline_context(Role::Editor, Some(org)).await;
        let store = ContentStore::new(ctx);

        // The add gate passes; the attempt then fails at the offline backend.
        let err = store.add_item("news", Map::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));

        let err = store.update_item("news", 1, Map::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Denied(_)));
    }

    #[tokio::test]
    async fn fetch_item_finds_cached_rows() {
        let org = Uuid::new_v4();
        let ctx = offline_context(Role::Admin, Some(org)).await;
        let store = ContentStore::new(ctx);
        store
            .seed_cache(
                "news",
                CollectionContent {
                    collection: collection(org),
                    fields: vec![],
                    items: vec![item(7, org)],
                },
            )
            .await;

        assert_eq!(store.fetch_item("news", 7).await.unwrap().id, 7);
        assert!(matches!(
            store.fetch_item("news", 8).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
